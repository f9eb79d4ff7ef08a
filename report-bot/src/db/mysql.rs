//! MySQL implementation of the report source.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use report_common::DatabaseConfig;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, Executor, Row, Statement, TypeInfo};
use tracing::debug;

use super::{validate_table_name, Cell, Connector, ReportSource, Table};
use crate::error::{ReportError, ReportResult};

/// Opens one MySQL connection per report build.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
    control_table: String,
}

impl MySqlConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name);

        Self {
            options,
            control_table: config.control_table.clone(),
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self) -> ReportResult<Box<dyn ReportSource>> {
        let conn = self.options.connect().await?;
        Ok(Box::new(MySqlSource {
            conn,
            control_table: self.control_table.clone(),
        }))
    }
}

/// A live MySQL connection.
pub struct MySqlSource {
    conn: MySqlConnection,
    control_table: String,
}

#[async_trait]
impl ReportSource for MySqlSource {
    async fn fetch_accounts(&mut self) -> ReportResult<Vec<String>> {
        let table = validate_table_name(&self.control_table)?;
        let query = format!("SELECT id_key FROM {table}");

        let rows = sqlx::query(&query).fetch_all(&mut self.conn).await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("id_key").map_err(ReportError::from))
            .collect()
    }

    async fn fetch_table(&mut self, table: &str) -> ReportResult<Table> {
        let name = validate_table_name(table)?;
        let query = format!("SELECT * FROM {name}");

        // Prepare first so the column names are known even for empty tables.
        let statement = (&mut self.conn).prepare(&query).await?;
        let columns = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let rows = statement.query().fetch_all(&mut self.conn).await?;

        let mut result = Table::new(name, columns);
        for row in &rows {
            let cells = (0..row.len())
                .map(|i| decode_cell(name, row, i))
                .collect::<ReportResult<Vec<_>>>()?;
            result.push_row(cells);
        }

        debug!(table = name, rows = result.len(), "Table fetched");
        Ok(result)
    }

    async fn close(self: Box<Self>) -> ReportResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Decode one column of a row by its MySQL type name.
fn decode_cell(table: &str, row: &MySqlRow, index: usize) -> ReportResult<Cell> {
    let column = row.column(index);
    let type_name = column.type_info().name();

    let cell = match type_name {
        "NULL" => Cell::Null,
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.map(i64::from).into(),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<Option<i64>, _>(index)?.into()
        }
        name if name.ends_with("UNSIGNED") => match row.try_get::<Option<u64>, _>(index)? {
            None => Cell::Null,
            Some(v) => i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int),
        },
        "FLOAT" => row.try_get::<Option<f32>, _>(index)?.map(f64::from).into(),
        "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.into(),
        "DECIMAL" => row.try_get::<Option<Decimal>, _>(index)?.into(),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(index)?.into(),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map_or(Cell::Null, Cell::DateTime),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(index)?
            .map_or(Cell::Null, |t| Cell::Text(t.format("%H:%M:%S").to_string())),
        _ => decode_fallback(table, row, index, type_name)?,
    };

    Ok(cell)
}

/// Text-like and unusual types: try text, then raw bytes.
fn decode_fallback(
    table: &str,
    row: &MySqlRow,
    index: usize,
    type_name: &str,
) -> ReportResult<Cell> {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return Ok(value.into());
    }
    if let Ok(value) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return Ok(value.map_or(Cell::Null, |bytes| {
            Cell::Text(String::from_utf8_lossy(&bytes).into_owned())
        }));
    }

    Err(ReportError::InvalidValue {
        table: table.to_string(),
        column: row.column(index).name().to_string(),
        reason: format!("unsupported column type {type_name}"),
    })
}
