//! API Service - Read-only comparison data over imported DMS reports
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /summary - Month count with month-over-month and year-over-year change
//! - GET /inventory/ageing - Aged vs fresh stock per model line
//! - GET /sales/finance - Deliveries per finance bank for a month
//! - GET /imports - Recent import runs

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use ingest::model::AGED_STOCK_DAYS;
use ingest::ReportType;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
struct AppState {
    pool: PgPool,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Serialize, Debug, PartialEq)]
struct SummaryResponse {
    report: ReportType,
    month: String,
    count: i64,
    previous_month: String,
    previous_month_count: i64,
    previous_year_month: String,
    previous_year_count: i64,
    mom_change_pct: Option<f64>,
    yoy_change_pct: Option<f64>,
}

#[derive(Serialize)]
struct AgeingResponse {
    threshold_days: i64,
    total: i64,
    aged: i64,
    fresh: i64,
    models: Vec<ModelAgeing>,
}

#[derive(Serialize)]
struct ModelAgeing {
    model_line: String,
    total: i64,
    aged: i64,
    fresh: i64,
}

#[derive(Serialize)]
struct FinanceResponse {
    month: String,
    deliveries: i64,
    banks: Vec<FinanceShare>,
}

#[derive(Serialize)]
struct FinanceShare {
    finance_bank: String,
    deliveries: i64,
    share_pct: f64,
}

#[derive(Serialize, sqlx::FromRow)]
struct ImportRunResponse {
    import_run_id: Uuid,
    file_name: String,
    report_type: Option<String>,
    status: String,
    rows_seen: i64,
    rows_dropped: i64,
    records_upserted: i64,
    error: Option<String>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct SummaryQuery {
    report: ReportType,
    month: String,
}

#[derive(Deserialize)]
struct AgeingQuery {
    threshold: Option<i64>,
}

#[derive(Deserialize)]
struct MonthQuery {
    month: String,
}

#[derive(Deserialize)]
struct ImportsQuery {
    limit: Option<i64>,
}

// ============================================================================
// Month arithmetic
// ============================================================================

/// Parse a "YYYY-MM" bucket.
fn parse_month(month: &str) -> Option<(i32, u32)> {
    let (year, month) = month.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

fn format_month(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn pct_change(current: i64, previous: i64) -> Option<f64> {
    (previous > 0).then(|| ((current - previous) as f64 / previous as f64) * 100.0)
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: "0.1.0",
    })
}

async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryQuery>,
) -> Response {
    // Inventory is a stock snapshot with no month bucket.
    let table = match params.report {
        ReportType::Leads | ReportType::Opportunities | ReportType::Sales => params.report.table(),
        _ => None,
    };
    let Some(table) = table else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("{} has no monthly summary", params.report),
        );
    };
    let Some((year, month)) = parse_month(&params.month) else {
        return error_response(StatusCode::BAD_REQUEST, "month must be YYYY-MM");
    };

    let current = format_month(year, month);
    let (py, pm) = previous_month(year, month);
    let prev_month = format_month(py, pm);
    let prev_year = format_month(year - 1, month);

    // Table name comes from ReportType, never from the request text.
    let query = format!(
        "SELECT year_month, COUNT(*) AS n FROM {} WHERE year_month = ANY($1) GROUP BY year_month",
        table
    );
    let rows = sqlx::query(&query)
        .bind(vec![current.clone(), prev_month.clone(), prev_year.clone()])
        .fetch_all(&state.pool)
        .await;

    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    let count_for = |bucket: &str| -> i64 {
        rows.iter()
            .find(|r| r.get::<String, _>("year_month") == bucket)
            .map(|r| r.get::<i64, _>("n"))
            .unwrap_or(0)
    };

    let count = count_for(current.as_str());
    let previous_month_count = count_for(prev_month.as_str());
    let previous_year_count = count_for(prev_year.as_str());

    Json(SummaryResponse {
        report: params.report,
        month: current,
        count,
        previous_month: prev_month,
        previous_month_count,
        previous_year_month: prev_year,
        previous_year_count,
        mom_change_pct: pct_change(count, previous_month_count),
        yoy_change_pct: pct_change(count, previous_year_count),
    })
    .into_response()
}

async fn ageing_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AgeingQuery>,
) -> Response {
    let threshold = params.threshold.unwrap_or(AGED_STOCK_DAYS);

    let rows = sqlx::query(
        r#"
        SELECT
            COALESCE(NULLIF(model_line, ''), 'Unspecified') AS model_line,
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE ageing_days > $1) AS aged
        FROM inventory
        GROUP BY 1
        ORDER BY aged DESC, model_line
        "#,
    )
    .bind(threshold)
    .fetch_all(&state.pool)
    .await;

    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    let models: Vec<ModelAgeing> = rows
        .iter()
        .map(|r| {
            let total: i64 = r.get("total");
            let aged: i64 = r.get("aged");
            ModelAgeing {
                model_line: r.get("model_line"),
                total,
                aged,
                fresh: total - aged,
            }
        })
        .collect();

    let total: i64 = models.iter().map(|m| m.total).sum();
    let aged: i64 = models.iter().map(|m| m.aged).sum();

    Json(AgeingResponse {
        threshold_days: threshold,
        total,
        aged,
        fresh: total - aged,
        models,
    })
    .into_response()
}

async fn finance_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MonthQuery>,
) -> Response {
    let Some((year, month)) = parse_month(&params.month) else {
        return error_response(StatusCode::BAD_REQUEST, "month must be YYYY-MM");
    };
    let month = format_month(year, month);

    let rows = sqlx::query(
        r#"
        SELECT COALESCE(NULLIF(finance_bank, ''), 'Unspecified') AS finance_bank,
               COUNT(*) AS deliveries
        FROM sales
        WHERE year_month = $1
        GROUP BY 1
        ORDER BY deliveries DESC, finance_bank
        "#,
    )
    .bind(&month)
    .fetch_all(&state.pool)
    .await;

    let rows = match rows {
        Ok(rows) => rows,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    let deliveries: i64 = rows.iter().map(|r| r.get::<i64, _>("deliveries")).sum();
    let banks = rows
        .iter()
        .map(|r| {
            let count: i64 = r.get("deliveries");
            FinanceShare {
                finance_bank: r.get("finance_bank"),
                deliveries: count,
                share_pct: if deliveries > 0 {
                    (count as f64 / deliveries as f64) * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    Json(FinanceResponse {
        month,
        deliveries,
        banks,
    })
    .into_response()
}

async fn imports_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImportsQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(20).clamp(1, 200);

    let runs: Result<Vec<ImportRunResponse>, _> = sqlx::query_as(
        r#"
        SELECT import_run_id, file_name, report_type, status, rows_seen, rows_dropped,
               records_upserted, error, started_at, finished_at
        FROM import_runs
        ORDER BY started_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(&state.pool)
    .await;

    match runs {
        Ok(runs) => Json(serde_json::json!({ "imports": runs })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_url = std::env::var("DB_URL").context("DB_URL env var missing")?;
    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    println!("=== DMS Analytics API ===");
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await
        .context("Failed to connect to database")?;

    log::info!("database connected");

    let state = Arc::new(AppState { pool });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/summary", get(summary_handler))
        .route("/inventory/ageing", get(ageing_handler))
        .route("/sales/finance", get(finance_handler))
        .route("/imports", get(imports_handler))
        .layer(cors)
        .with_state(state);

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET /health");
    println!("  GET /summary?report=leads|opportunities|sales&month=YYYY-MM");
    println!("  GET /inventory/ageing?threshold=");
    println!("  GET /sales/finance?month=YYYY-MM");
    println!("  GET /imports?limit=");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
