// Backend abstraction: one query-execution contract over two structurally
// different data sources.

pub mod dataframe;
pub mod sqlite;

pub use dataframe::DataFrameBackend;
pub use sqlite::SqliteBackend;

use crate::api::middleware::AppError;
use crate::models::{ResultTable, SchemaDescriptor};
use serde::{Deserialize, Serialize};

/// Which kind of backend the session currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    None,
    Relational,
    InMemoryTable,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::Relational => "relational",
            BackendKind::InMemoryTable => "in-memory-table",
        }
    }
}

/// Declared format of an uploaded tabular byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    Csv,
    Spreadsheet,
}

/// What to connect to: a named persistent relational source, or an uploaded
/// byte stream with a declared format.
#[derive(Debug, Clone)]
pub enum SourceDescriptor {
    Relational { path: String },
    Upload { format: UploadFormat, bytes: Vec<u8> },
}

/// Result of one query execution.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub table: ResultTable,
    /// True when the in-memory path substituted a prefix of the original
    /// table for a failed query. Deliberate, documented degradation.
    pub fallback_prefix: bool,
}

impl QueryOutcome {
    pub fn full(table: ResultTable) -> Self {
        Self {
            table,
            fallback_prefix: false,
        }
    }
}

/// Query-execution contract both backends satisfy.
///
/// Execution is read-only and synchronous from the caller's perspective; any
/// engine error surfaces as a typed failure, never an unwind.
#[async_trait::async_trait]
pub trait QueryBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Structured schema descriptor captured at connect time.
    fn schema(&self) -> &SchemaDescriptor;

    /// Uniform textual schema description, or the sentinel
    /// [`crate::models::SCHEMA_UNAVAILABLE`] when introspection failed.
    fn schema_text(&self) -> String;

    async fn run_query(&self, sql: &str) -> Result<QueryOutcome, AppError>;
}

/// Build the backend for a source descriptor. Fails with
/// `AppError::Connection` on bad or missing sources; the caller installs the
/// result into the session only on success.
pub async fn create_backend(source: &SourceDescriptor) -> Result<Box<dyn QueryBackend>, AppError> {
    match source {
        SourceDescriptor::Relational { path } => {
            Ok(Box::new(SqliteBackend::open(path).await?))
        }
        SourceDescriptor::Upload { format, bytes } => {
            Ok(Box::new(DataFrameBackend::from_upload(*format, bytes)?))
        }
    }
}
