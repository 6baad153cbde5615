//! DMS report ingestion.
//!
//! Turns dealer-management-system CSV (or workbook) exports into canonical,
//! natural-keyed records and upserts them through a `RecordStore`:
//!
//! text -> `tokenize` -> `header` -> `classify` -> `mapper` (via `resolve`
//! and `dates`) -> `payload` -> `store`.

pub mod classify;
pub mod dates;
pub mod error;
pub mod header;
pub mod mapper;
pub mod model;
pub mod payload;
pub mod pg;
pub mod pipeline;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod tokenize;

pub use dates::DateOrder;
pub use error::{ImportError, SchemaError, StoreError};
pub use model::{CanonicalRecord, RawRow, ReportType};
pub use pipeline::{import_file, import_text, prepare, ImportOptions, ImportReport};
pub use schema::Schema;
pub use store::{MemoryStore, RecordStore};
