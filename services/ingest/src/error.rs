use thiserror::Error;

/// Terminal failures of a single import attempt.
///
/// None of these are recovered inside the pipeline: no retry, no alternate
/// classification, no partial commit. Rows without a natural key are filtered
/// out silently and never surface here.
#[derive(Debug, Error)]
pub enum ImportError {
    /// No header row in the scan window, or a header no rule recognises.
    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(String),

    /// The report type was recognised but every row lacked its natural key.
    #[error("Empty payload: {report} file has {rows} data rows but none carry a {key}")]
    EmptyPayload {
        report: String,
        rows: usize,
        key: String,
    },

    /// The store rejected the upsert. Message is passed through verbatim.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("Failed to read input: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to read workbook: {0}")]
    Workbook(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure reported by a `RecordStore`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("table '{table}' does not accept {kind} records")]
    TableMismatch { table: String, kind: String },

    #[error("{0}")]
    Other(String),
}

/// Failure loading a schema configuration file.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse schema file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Schema {version} has no aliases for natural key field '{field}'")]
    MissingKeyAliases { version: String, field: String },
}

pub type Result<T> = std::result::Result<T, ImportError>;
