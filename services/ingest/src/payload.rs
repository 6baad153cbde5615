//! Keys a batch of canonical records for idempotent upsert.

use crate::model::{CanonicalRecord, ReportType};
use std::collections::HashMap;

/// Everything the store needs for one upsert call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertPayload {
    pub report: ReportType,
    pub table: &'static str,
    pub conflict_key: &'static str,
    pub records: Vec<CanonicalRecord>,
    /// Records replaced by a later record with the same natural key.
    pub duplicates: usize,
}

impl UpsertPayload {
    /// Deduplicate by natural key, last record wins. The survivor takes the
    /// slot of the key's first occurrence so output order stays stable.
    ///
    /// Returns `None` for `Unknown`, which has no table. Records of another
    /// report type are skipped.
    pub fn build(report: ReportType, records: Vec<CanonicalRecord>) -> Option<Self> {
        let table = report.table()?;
        let conflict_key = report.conflict_key()?;

        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut keyed: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
        let mut duplicates = 0;

        for record in records {
            if record.report_type() != report {
                log::warn!(
                    "skipping {} record {} in {} payload",
                    record.report_type(),
                    record.natural_key(),
                    report
                );
                continue;
            }
            match slots.get(record.natural_key()) {
                Some(&slot) => {
                    keyed[slot] = record;
                    duplicates += 1;
                }
                None => {
                    slots.insert(record.natural_key().to_string(), keyed.len());
                    keyed.push(record);
                }
            }
        }

        Some(Self {
            report,
            table,
            conflict_key,
            records: keyed,
            duplicates,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
