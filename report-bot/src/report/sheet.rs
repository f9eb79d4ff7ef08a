//! Worksheet layout and `.xlsx` output.

use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, FormatBorder, Workbook, Worksheet};
use std::path::Path;

use crate::db::{Cell, Table};
use crate::error::{ReportError, ReportResult};

/// Aggregate tables written after the account sheets, in this order.
pub const FIXED_TABLES: [&str; 4] = ["total_report", "stats", "tickers", "equity"];

/// Table holding the long-format equity curve.
pub const EQUITY_TABLE: &str = "equity";

/// Source table of an account's sheet.
pub fn account_table_name(account: &str) -> String {
    format!("report_{}", account.to_lowercase())
}

/// Sheet name of an account.
pub fn account_sheet_name(account: &str) -> String {
    account.to_uppercase()
}

/// Sheet name of a fixed table; the total report is shown as `SI`.
pub fn fixed_sheet_name(table: &str) -> String {
    match table {
        "total_report" => "SI".to_string(),
        other => other.to_uppercase(),
    }
}

/// Width of every column: the longest stringified value or header, plus one.
pub fn column_widths(table: &Table) -> Vec<usize> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(i, header)| {
            let longest_cell = table
                .rows
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.to_string().chars().count())
                .max()
                .unwrap_or(0);
            longest_cell.max(header.chars().count()) + 1
        })
        .collect()
}

/// One worksheet: a table plus its column widths.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub table: Table,
    pub column_widths: Vec<usize>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        let column_widths = column_widths(&table);
        Self {
            name: name.into(),
            table,
            column_widths,
        }
    }
}

fn col_num(index: usize) -> ReportResult<u16> {
    u16::try_from(index).map_err(|_| ReportError::Task(format!("column {index} out of range")))
}

fn row_num(index: usize) -> ReportResult<u32> {
    u32::try_from(index).map_err(|_| ReportError::Task(format!("row {index} out of range")))
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> ReportResult<()> {
    match cell {
        Cell::Null => {}
        Cell::Int(v) => {
            worksheet.write_number(row, col, *v as f64)?;
        }
        Cell::Float(v) if v.is_finite() => {
            worksheet.write_number(row, col, *v)?;
        }
        Cell::Float(_) => {}
        Cell::Decimal(d) => match d.to_f64() {
            Some(v) => {
                worksheet.write_number(row, col, v)?;
            }
            None => {
                worksheet.write_string(row, col, d.to_string())?;
            }
        },
        Cell::Text(s) => {
            worksheet.write_string(row, col, s)?;
        }
        Cell::Date(_) | Cell::DateTime(_) => {
            worksheet.write_string(row, col, cell.to_string())?;
        }
    }
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet, header: &Format) -> ReportResult<()> {
    worksheet.set_name(&sheet.name)?;

    for (i, name) in sheet.table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col_num(i)?, name, header)?;
    }

    for (r, row) in sheet.table.rows.iter().enumerate() {
        let row_idx = row_num(r + 1)?;
        for (c, cell) in row.iter().enumerate() {
            write_cell(worksheet, row_idx, col_num(c)?, cell)?;
        }
    }

    for (c, width) in sheet.column_widths.iter().enumerate() {
        worksheet.set_column_width(col_num(c)?, *width as f64)?;
    }

    Ok(())
}

/// Write all sheets to `path`, replacing any existing file.
///
/// Blocking; run it off the async runtime.
pub fn write_workbook(path: &Path, sheets: &[Sheet]) -> ReportResult<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold().set_border(FormatBorder::Thin);

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet, &header)?;
    }

    workbook.save(path)?;
    Ok(())
}
