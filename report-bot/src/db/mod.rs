//! Read-only access to the reporting database.
//!
//! Reports are built from whole tables: the control table lists the accounts,
//! every other table is read with `SELECT *` and kept as a [`Table`] of
//! loosely typed [`Cell`]s. Access goes through the [`Connector`] and
//! [`ReportSource`] traits so the report pipeline can run against an
//! in-memory source in tests.

pub mod mysql;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use report_common::RetryPolicy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

use crate::error::{ReportError, ReportResult};

pub use mysql::MySqlConnector;

/// A single value read from the database.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    /// Fixed-point value, kept at its stored scale
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    /// Numeric view of the cell; text is parsed when it holds a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Decimal(d) => d.to_f64(),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Stringified form, used for column sizing and pivot keys.
///
/// Whole floats keep one decimal place (`10.0`), nulls are empty.
impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for Cell {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A table read from the database: column names plus rows in query order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the column count.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Index of a column that must exist.
    pub fn require_column(&self, column: &str) -> ReportResult<usize> {
        self.column_index(column)
            .ok_or_else(|| ReportError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reject anything that is not a plain SQL identifier.
///
/// Table names end up interpolated into `SELECT * FROM {name}`, and some of
/// them (`report_{account}`) come from database content.
pub fn validate_table_name(name: &str) -> ReportResult<&str> {
    let valid = !name.is_empty()
        && name.len() <= 64
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(ReportError::InvalidTableName(name.to_string()))
    }
}

/// An open database connection, used for the duration of one report build.
#[async_trait]
pub trait ReportSource: Send {
    /// Account identifiers from the control table, in query order.
    async fn fetch_accounts(&mut self) -> ReportResult<Vec<String>>;

    /// Every row of a table.
    async fn fetch_table(&mut self, table: &str) -> ReportResult<Table>;

    /// Release the connection.
    async fn close(self: Box<Self>) -> ReportResult<()>;
}

/// Opens [`ReportSource`]s.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> ReportResult<Box<dyn ReportSource>>;
}

/// Acquires database connections, retrying failed attempts.
///
/// With the production policy (`RetryPolicy::forever`) `connect` only returns
/// once a connection is established; bounded policies surface the last error.
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn connect(&self) -> ReportResult<Box<dyn ReportSource>> {
        let source = self
            .policy
            .run("Database connection", |_| self.connector.connect())
            .await?;
        tracing::info!("Database connection established");
        Ok(source)
    }
}
