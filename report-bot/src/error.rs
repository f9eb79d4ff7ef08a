//! Error types for report building and delivery.

use thiserror::Error;

use crate::telegram::TransportError;

/// Result type for report building.
pub type ReportResult<T> = Result<T, ReportError>;

/// Anything that can go wrong while extracting, transforming or writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("Table {table} has no column {column}")]
    MissingColumn { table: String, column: String },

    #[error("Invalid value in {table}.{column}: {reason}")]
    InvalidValue {
        table: String,
        column: String,
        reason: String,
    },

    #[error("Workbook writer task failed: {0}")]
    Task(String),
}

impl ReportError {
    /// Short error category, used in log lines.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "DatabaseError",
            Self::Workbook(_) => "WorkbookError",
            Self::Io(_) => "IoError",
            Self::InvalidTableName(_) => "InvalidTableName",
            Self::MissingColumn { .. } => "MissingColumn",
            Self::InvalidValue { .. } => "InvalidValue",
            Self::Task(_) => "TaskError",
        }
    }
}

/// Failure to get a built report to a chat.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Report build failed: {0}")]
    Build(#[from] ReportError),

    #[error("Failed to read report file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Chat transport error: {0}")]
    Transport(#[from] TransportError),
}
