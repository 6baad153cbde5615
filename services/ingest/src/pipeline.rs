//! Import entry points: raw content in, persisted canonical records out.
//!
//! The whole file is parsed in memory before the single upsert call. Any
//! error aborts the import with nothing written by this pipeline.

use crate::classify::classify;
use crate::dates::DateOrder;
use crate::error::{ImportError, Result};
use crate::header::{header_line, locate_header, DEFAULT_SCAN_ROWS};
use crate::mapper::RecordMapper;
use crate::model::{RawRow, ReportType};
use crate::payload::UpsertPayload;
use crate::schema::Schema;
use crate::store::RecordStore;
use crate::tokenize::{decode, read_workbook, tokenize};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub schema: Schema,
    pub date_order: DateOrder,
    pub scan_rows: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            schema: Schema::builtin(),
            date_order: DateOrder::default(),
            scan_rows: DEFAULT_SCAN_ROWS,
        }
    }
}

/// A parsed file ready for persistence.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub header_row: usize,
    pub rows_seen: usize,
    pub rows_dropped: usize,
    pub payload: UpsertPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub report_type: ReportType,
    pub header_row: usize,
    pub rows_seen: usize,
    pub rows_dropped: usize,
    pub duplicates: usize,
    pub records_upserted: usize,
}

/// Locate, classify and map already tokenized rows.
pub fn prepare_rows(rows: Vec<Vec<String>>, options: &ImportOptions) -> Result<Prepared> {
    let header_row = locate_header(&rows, &options.schema.signatures, options.scan_rows)
        .ok_or_else(|| {
            ImportError::UnrecognizedFormat(format!(
                "no known report header in the first {} rows",
                options.scan_rows
            ))
        })?;

    let headers = &rows[header_row];
    let report = classify(headers, &options.schema.rules);
    if report == ReportType::Unknown {
        return Err(ImportError::UnrecognizedFormat(format!(
            "header on row {} matches no report type: {}",
            header_row + 1,
            header_line(headers)
        )));
    }
    log::info!(
        "header on row {} classified as {} (schema {})",
        header_row + 1,
        report,
        options.schema.version
    );

    let mapper = RecordMapper::new(&options.schema, report, options.date_order);
    let data = &rows[header_row + 1..];
    let records: Vec<_> = data
        .iter()
        .filter_map(|fields| mapper.map(&RawRow::new(headers, fields)))
        .collect();

    let rows_seen = data.len();
    let rows_dropped = rows_seen - records.len();
    if rows_dropped > 0 {
        log::info!(
            "dropped {} of {} rows without a {}",
            rows_dropped,
            rows_seen,
            mapper.key_field()
        );
    }

    if records.is_empty() {
        return Err(ImportError::EmptyPayload {
            report: report.to_string(),
            rows: rows_seen,
            key: mapper.key_field().to_string(),
        });
    }

    let payload = UpsertPayload::build(report, records).ok_or_else(|| {
        ImportError::UnrecognizedFormat(format!("{} has no destination table", report))
    })?;
    if payload.duplicates > 0 {
        log::info!(
            "collapsed {} duplicate {} values (last row wins)",
            payload.duplicates,
            payload.conflict_key
        );
    }

    Ok(Prepared {
        header_row,
        rows_seen,
        rows_dropped,
        payload,
    })
}

/// Parse comma-separated text without touching any store.
pub fn prepare(text: &str, options: &ImportOptions) -> Result<Prepared> {
    prepare_rows(tokenize(text)?, options)
}

/// Parse a file from disk. Workbooks go through calamine, everything else is
/// decoded and tokenized as CSV.
pub async fn prepare_file(path: &Path, options: &ImportOptions) -> Result<Prepared> {
    let rows = if is_workbook(path) {
        read_workbook(path)?
    } else {
        let bytes = tokio::fs::read(path).await?;
        log::debug!("read {} bytes from {}", bytes.len(), path.display());
        tokenize(&decode(&bytes))?
    };
    prepare_rows(rows, options)
}

/// Hand a prepared payload to the store in one upsert call.
pub async fn persist<S: RecordStore>(store: &S, prepared: &Prepared) -> Result<ImportReport> {
    let payload = &prepared.payload;
    let written = store
        .upsert(payload.table, &payload.records, payload.conflict_key)
        .await?;

    log::info!("upserted {} records into {}", written, payload.table);

    Ok(ImportReport {
        report_type: payload.report,
        header_row: prepared.header_row,
        rows_seen: prepared.rows_seen,
        rows_dropped: prepared.rows_dropped,
        duplicates: payload.duplicates,
        records_upserted: written,
    })
}

pub async fn import_text<S: RecordStore>(
    store: &S,
    text: &str,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let prepared = prepare(text, options)?;
    persist(store, &prepared).await
}

pub async fn import_file<S: RecordStore>(
    store: &S,
    path: &Path,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let prepared = prepare_file(path, options).await?;
    persist(store, &prepared).await
}

/// Excel-family files by extension.
pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_ascii_lowercase().as_str(),
                "xls" | "xlsx" | "xlsm" | "xlsb" | "ods"
            )
        })
        .unwrap_or(false)
}
