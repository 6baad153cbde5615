//! Persistence seam. The pipeline only ever calls `upsert`.

use crate::error::StoreError;
use crate::model::CanonicalRecord;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// An upsert-capable table service.
///
/// One call is atomic from the caller's point of view: either every record is
/// written or the call fails.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    /// Insert or update `records` in `table`, resolving conflicts on
    /// `conflict_key`. Returns the number of records written.
    async fn upsert(
        &self,
        table: &str,
        records: &[CanonicalRecord],
        conflict_key: &str,
    ) -> Result<usize, StoreError>;
}

/// Check that every record belongs in `table` with the given conflict key.
pub(crate) fn check_table(
    table: &str,
    records: &[CanonicalRecord],
    conflict_key: &str,
) -> Result<(), StoreError> {
    for record in records {
        let report = record.report_type();
        if report.table() != Some(table) || report.conflict_key() != Some(conflict_key) {
            return Err(StoreError::TableMismatch {
                table: table.to_string(),
                kind: report.to_string(),
            });
        }
    }
    Ok(())
}

type Tables = BTreeMap<String, BTreeMap<String, CanonicalRecord>>;

/// In-process store keyed by table and natural key. Used for dry runs and
/// tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    calls: AtomicUsize,
    fail_with: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every upsert fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Number of upsert calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Records in `table`, ordered by natural key.
    pub fn records(&self, table: &str) -> Vec<CanonicalRecord> {
        self.tables
            .lock()
            .map(|tables| {
                tables
                    .get(table)
                    .map(|rows| rows.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, table: &str) -> usize {
        self.records(table).len()
    }
}

impl RecordStore for MemoryStore {
    async fn upsert(
        &self,
        table: &str,
        records: &[CanonicalRecord],
        conflict_key: &str,
    ) -> Result<usize, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.fail_with {
            return Err(StoreError::Other(message.clone()));
        }
        check_table(table, records, conflict_key)?;

        let mut tables = self
            .tables
            .lock()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))?;
        let rows = tables.entry(table.to_string()).or_default();
        for record in records {
            rows.insert(record.natural_key().to_string(), record.clone());
        }

        Ok(records.len())
    }
}
