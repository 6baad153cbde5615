//! Ingest Service - Imports DMS report exports into canonical tables
//!
//! Responsibilities:
//! - Read a leads / opportunities / sales / inventory export (CSV or workbook)
//! - Detect the report type from its header row
//! - Map vendor column names onto the canonical schema
//! - Upsert records keyed by their natural key (re-imports overwrite)
//! - Track every import in import_runs
//!
//! Usage:
//!   cargo run --bin ingest -- --init-schema
//!   cargo run --bin ingest -- --file exports/stock_march.csv
//!   cargo run --bin ingest -- --file exports/leads.csv --date-order day-first --dry-run

use anyhow::{Context, Result};
use clap::Parser;
use ingest::header::DEFAULT_SCAN_ROWS;
use ingest::pg::{PgStore, RunOutcome};
use ingest::pipeline::{is_workbook, persist, prepare, prepare_file, ImportReport, Prepared};
use ingest::tokenize::decode;
use ingest::{DateOrder, ImportError, ImportOptions, MemoryStore, Schema, StoreError};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Parser, Debug)]
#[command(name = "ingest", about = "Imports DMS report exports into canonical tables")]
struct Args {
    /// Report file to import (.csv, .xls, .xlsx, .ods)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Schema JSON overriding the built-in rules and aliases
    #[arg(long)]
    schema: Option<PathBuf>,

    /// How to read ambiguous slash dates such as 03/04/2024
    #[arg(long, env = "DATE_ORDER", value_enum, default_value_t = DateOrder::MonthFirst)]
    date_order: DateOrder,

    /// Rows searched for the header line
    #[arg(
        long,
        env = "HEADER_SCAN_ROWS",
        default_value_t = DEFAULT_SCAN_ROWS,
        value_parser = parse_scan_rows
    )]
    scan_rows: usize,

    /// Dry run - parse and report, don't save to database
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Create tables before importing
    #[arg(long, default_value = "false")]
    init_schema: bool,

    /// Print the active schema as JSON and exit
    #[arg(long, default_value = "false")]
    print_schema: bool,
}

fn parse_scan_rows(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(rows) => Ok(rows),
        Err(e) => Err(format!("must be a positive integer ({})", e)),
    }
}

#[derive(Debug, Clone)]
struct Config {
    db_url: Option<String>,
}

impl Config {
    fn from_env() -> Self {
        Self {
            db_url: std::env::var("DB_URL").ok(),
        }
    }
}

/// Read and parse the file once, returning its content hash with the payload.
async fn load(path: &Path, options: &ImportOptions) -> Result<(String, Prepared), ImportError> {
    let bytes = fs::read(path).await?;
    let content_hash = format!("sha256:{:x}", Sha256::digest(&bytes));

    let prepared = if is_workbook(path) {
        prepare_file(path, options).await?
    } else {
        prepare(&decode(&bytes), options)?
    };

    Ok((content_hash, prepared))
}

fn print_summary(prepared: &Prepared) {
    let payload = &prepared.payload;
    println!("Report type: {}", payload.report);
    println!("Header row: {}", prepared.header_row + 1);
    println!(
        "Rows: {} read, {} dropped (no {}), {} duplicates collapsed",
        prepared.rows_seen, prepared.rows_dropped, payload.conflict_key, payload.duplicates
    );

    for (i, record) in payload.records.iter().take(3).enumerate() {
        let json = serde_json::to_string(record)
            .unwrap_or_else(|_| record.natural_key().to_string());
        println!("  [{}] {}", i + 1, json);
    }
    if payload.records.len() > 3 {
        println!("  ... and {} more", payload.records.len() - 3);
    }
}

fn outcome<'a>(
    prepared: &'a Prepared,
    report: Option<&ImportReport>,
    error: Option<&'a str>,
) -> RunOutcome<'a> {
    RunOutcome {
        status: if error.is_some() { "failed" } else { "ok" },
        report_type: Some(prepared.payload.report.as_str()),
        rows_seen: prepared.rows_seen,
        rows_dropped: prepared.rows_dropped,
        duplicates: prepared.payload.duplicates,
        records_upserted: report.map(|r| r.records_upserted).unwrap_or(0),
        error,
    }
}

/// Outcome for a file that failed before a payload existed. An empty payload
/// still knows its report type and row count.
fn load_failure<'a>(err: &'a ImportError, message: &'a str) -> RunOutcome<'a> {
    let failed = RunOutcome {
        status: "failed",
        error: Some(message),
        ..RunOutcome::default()
    };
    match err {
        ImportError::EmptyPayload { report, rows, .. } => RunOutcome {
            report_type: Some(report.as_str()),
            rows_seen: *rows,
            rows_dropped: *rows,
            ..failed
        },
        _ => failed,
    }
}

async fn record_load_failure(
    store: &PgStore,
    file_name: &str,
    schema_version: &str,
    err: &ImportError,
) -> Result<(), StoreError> {
    let message = err.to_string();
    let run_id = store.start_run(file_name, "unavailable", schema_version).await?;
    store.finish_run(run_id, &load_failure(err, &message)).await
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = Config::from_env();

    let schema = match &args.schema {
        Some(path) => Schema::load(path)
            .with_context(|| format!("Failed to load schema {}", path.display()))?,
        None => Schema::builtin(),
    };

    if args.print_schema {
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let options = ImportOptions {
        schema,
        date_order: args.date_order,
        scan_rows: args.scan_rows,
    };

    println!("=== DMS Report Import ===");
    println!("Schema: {}", options.schema.version);
    println!("Mode: {}", if args.dry_run { "dry-run" } else { "live" });

    if args.dry_run {
        let path = args.file.as_deref().context("--file is required for a dry run")?;
        println!("File: {}", path.display());

        let (content_hash, prepared) = load(path, &options).await?;
        println!("Hash: {}", content_hash);
        print_summary(&prepared);

        let store = MemoryStore::new();
        let report = persist(&store, &prepared).await?;
        println!(
            "\nDry run - {} records would be upserted into {} (conflict key {})",
            report.records_upserted, prepared.payload.table, prepared.payload.conflict_key
        );
        return Ok(());
    }

    let db_url = config.db_url.context("DB_URL env var missing")?;
    let store = PgStore::connect(&db_url)
        .await
        .context("Failed to connect to database")?;

    if args.init_schema {
        store.init_schema().await.context("Failed to create tables")?;
        println!("Tables ready");
    }

    let Some(path) = args.file.as_deref() else {
        if args.init_schema {
            return Ok(());
        }
        anyhow::bail!("Must specify --file <path> (or --init-schema / --print-schema)");
    };

    println!("File: {}", path.display());
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let (content_hash, prepared) = match load(path, &options).await {
        Ok(loaded) => loaded,
        Err(e) => {
            if let Err(bookkeeping) =
                record_load_failure(&store, &file_name, &options.schema.version, &e).await
            {
                log::error!("could not record failed import of {}: {}", file_name, bookkeeping);
            }
            return Err(e).context("Import failed");
        }
    };
    println!("Hash: {}", content_hash);
    print_summary(&prepared);

    let run_id = store
        .start_run(&file_name, &content_hash, &options.schema.version)
        .await?;

    let result = persist(&store, &prepared).await;

    match &result {
        Ok(report) => {
            store
                .finish_run(run_id, &outcome(&prepared, Some(report), None))
                .await?
        }
        Err(e) => {
            let message = e.to_string();
            if let Err(bookkeeping) = store
                .finish_run(run_id, &outcome(&prepared, None, Some(&message)))
                .await
            {
                log::error!("could not record failed import run {}: {}", run_id, bookkeeping);
            }
        }
    }

    let report = result.context("Import failed")?;
    println!("\n=== Import Complete ===");
    println!("Import run: {}", run_id);
    println!(
        "Upserted {} {} records into {}",
        report.records_upserted, report.report_type, prepared.payload.table
    );

    Ok(())
}
