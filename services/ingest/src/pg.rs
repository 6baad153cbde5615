//! PostgreSQL store and import-run bookkeeping.

use crate::error::StoreError;
use crate::model::CanonicalRecord;
use crate::store::{check_table, RecordStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Counters written to `import_runs` when a run finishes.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome<'a> {
    pub status: &'a str,
    pub report_type: Option<&'a str>,
    pub rows_seen: usize,
    pub rows_dropped: usize,
    pub duplicates: usize,
    pub records_upserted: usize,
    pub error: Option<&'a str>,
}

impl PgStore {
    pub async fn connect(db_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the record tables and `import_runs` if missing.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn start_run(
        &self,
        file_name: &str,
        content_hash: &str,
        schema_version: &str,
    ) -> Result<Uuid, StoreError> {
        let run_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO import_runs (import_run_id, file_name, content_hash, schema_version, status)
            VALUES ($1, $2, $3, $4, 'running')
            "#,
        )
        .bind(run_id)
        .bind(file_name)
        .bind(content_hash)
        .bind(schema_version)
        .execute(&self.pool)
        .await?;
        Ok(run_id)
    }

    pub async fn finish_run(
        &self,
        run_id: Uuid,
        outcome: &RunOutcome<'_>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE import_runs
            SET finished_at = now(), status = $2, report_type = $3, rows_seen = $4,
                rows_dropped = $5, duplicates = $6, records_upserted = $7, error = $8
            WHERE import_run_id = $1
            "#,
        )
        .bind(run_id)
        .bind(outcome.status)
        .bind(outcome.report_type)
        .bind(outcome.rows_seen as i64)
        .bind(outcome.rows_dropped as i64)
        .bind(outcome.duplicates as i64)
        .bind(outcome.records_upserted as i64)
        .bind(outcome.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl RecordStore for PgStore {
    async fn upsert(
        &self,
        table: &str,
        records: &[CanonicalRecord],
        conflict_key: &str,
    ) -> Result<usize, StoreError> {
        check_table(table, records, conflict_key)?;

        let mut tx = self.pool.begin().await?;
        for record in records {
            upsert_one(&mut tx, record).await?;
        }
        tx.commit().await?;

        Ok(records.len())
    }
}

async fn upsert_one(
    tx: &mut Transaction<'_, Postgres>,
    record: &CanonicalRecord,
) -> Result<(), sqlx::Error> {
    match record {
        CanonicalRecord::Lead(r) => {
            sqlx::query(
                r#"
                INSERT INTO leads
                    (lead_id, name, phone, city, state, status, source, created_date, year_month)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (lead_id) DO UPDATE SET
                    name = EXCLUDED.name, phone = EXCLUDED.phone, city = EXCLUDED.city,
                    state = EXCLUDED.state, status = EXCLUDED.status, source = EXCLUDED.source,
                    created_date = EXCLUDED.created_date, year_month = EXCLUDED.year_month,
                    updated_at = now()
                "#,
            )
            .bind(&r.lead_id)
            .bind(&r.name)
            .bind(&r.phone)
            .bind(&r.city)
            .bind(&r.state)
            .bind(&r.status)
            .bind(&r.source)
            .bind(r.created_date)
            .bind(&r.year_month)
            .execute(&mut **tx)
            .await?;
        }
        CanonicalRecord::Opportunity(r) => {
            sqlx::query(
                r#"
                INSERT INTO opportunities
                    (opportunity_id, test_drive_completed, qualification, created_date, year_month)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (opportunity_id) DO UPDATE SET
                    test_drive_completed = EXCLUDED.test_drive_completed,
                    qualification = EXCLUDED.qualification,
                    created_date = EXCLUDED.created_date, year_month = EXCLUDED.year_month,
                    updated_at = now()
                "#,
            )
            .bind(&r.opportunity_id)
            .bind(r.test_drive_completed)
            .bind(&r.qualification)
            .bind(r.created_date)
            .bind(&r.year_month)
            .execute(&mut **tx)
            .await?;
        }
        CanonicalRecord::Sale(r) => {
            sqlx::query(
                r#"
                INSERT INTO sales (order_number, vin, booking_date, delivery_date, finance_bank,
                    insurance_company, year_month)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (order_number) DO UPDATE SET
                    vin = EXCLUDED.vin, booking_date = EXCLUDED.booking_date,
                    delivery_date = EXCLUDED.delivery_date, finance_bank = EXCLUDED.finance_bank,
                    insurance_company = EXCLUDED.insurance_company,
                    year_month = EXCLUDED.year_month,
                    updated_at = now()
                "#,
            )
            .bind(&r.order_number)
            .bind(&r.vin)
            .bind(r.booking_date)
            .bind(r.delivery_date)
            .bind(&r.finance_bank)
            .bind(&r.insurance_company)
            .bind(&r.year_month)
            .execute(&mut **tx)
            .await?;
        }
        CanonicalRecord::Inventory(r) => {
            sqlx::query(
                r#"
                INSERT INTO inventory (vin, model_line, ageing_days, status)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (vin) DO UPDATE SET
                    model_line = EXCLUDED.model_line, ageing_days = EXCLUDED.ageing_days,
                    status = EXCLUDED.status, updated_at = now()
                "#,
            )
            .bind(&r.vin)
            .bind(&r.model_line)
            .bind(r.ageing_days)
            .bind(&r.status)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}
