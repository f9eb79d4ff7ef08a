//! Equity pivot: long `(date, trade_account, strategy, equity)` rows into one
//! row per date and one column per trade account.
//!
//! Rows where `trade_account == "all"` but `strategy != "all"` are
//! per-strategy aggregates over all accounts and are dropped before pivoting;
//! the `all/all` total survives as its own `all` column.

use std::collections::{BTreeMap, BTreeSet};

use crate::db::{Cell, Table};
use crate::error::{ReportError, ReportResult};

const AGGREGATE: &str = "all";

/// One observation from the `equity` table.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityRecord {
    pub date: Cell,
    pub trade_account: String,
    pub strategy: String,
    pub equity: Option<f64>,
}

impl EquityRecord {
    pub fn new(
        date: impl Into<Cell>,
        trade_account: impl Into<String>,
        strategy: impl Into<String>,
        equity: Option<f64>,
    ) -> Self {
        Self {
            date: date.into(),
            trade_account: trade_account.into(),
            strategy: strategy.into(),
            equity,
        }
    }

    /// Per-strategy aggregate at the "all accounts" level.
    pub fn is_strategy_aggregate(&self) -> bool {
        self.trade_account == AGGREGATE && self.strategy != AGGREGATE
    }
}

/// Read equity records out of a raw table.
///
/// Rows without a trade account have no pivot column and are skipped.
pub fn records_from_table(table: &Table) -> ReportResult<Vec<EquityRecord>> {
    let date_idx = table.require_column("date")?;
    let account_idx = table.require_column("trade_account")?;
    let strategy_idx = table.require_column("strategy")?;
    let equity_idx = table.require_column("equity")?;

    table
        .rows
        .iter()
        .filter(|row| !row[account_idx].is_null())
        .map(|row| {
            let equity = match &row[equity_idx] {
                Cell::Null => None,
                cell => Some(cell.as_f64().ok_or_else(|| ReportError::InvalidValue {
                    table: table.name.clone(),
                    column: "equity".to_string(),
                    reason: format!("not a number: {cell}"),
                })?),
            };

            Ok(EquityRecord {
                date: row[date_idx].clone(),
                trade_account: row[account_idx].to_string(),
                strategy: row[strategy_idx].to_string(),
                equity,
            })
        })
        .collect()
}

/// Drop per-strategy aggregates; applying it twice changes nothing.
pub fn exclude_strategy_aggregates(records: Vec<EquityRecord>) -> Vec<EquityRecord> {
    records
        .into_iter()
        .filter(|r| !r.is_strategy_aggregate())
        .collect()
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        self.sum / f64::from(self.count)
    }
}

/// Pivot records into the wide `date, <account>...` table.
///
/// Dates are sorted ascending and account columns lexicographically.
/// Several observations for the same date and account are averaged; rows
/// without a date or equity value are skipped, and date/account pairs with no
/// observation are left empty.
pub fn pivot_equity(records: &[EquityRecord]) -> Table {
    let mut by_date: BTreeMap<String, (Cell, BTreeMap<&str, Mean>)> = BTreeMap::new();
    let mut accounts: BTreeSet<&str> = BTreeSet::new();

    for record in records {
        let Some(equity) = record.equity else {
            continue;
        };
        if record.date.is_null() {
            continue;
        }

        accounts.insert(&record.trade_account);
        by_date
            .entry(record.date.to_string())
            .or_insert_with(|| (record.date.clone(), BTreeMap::new()))
            .1
            .entry(&record.trade_account)
            .or_default()
            .add(equity);
    }

    let mut columns = Vec::with_capacity(accounts.len() + 1);
    columns.push("date".to_string());
    columns.extend(accounts.iter().map(|a| a.to_string()));

    let mut table = Table::new("equity", columns);
    for (date, values) in by_date.into_values() {
        let mut row = Vec::with_capacity(accounts.len() + 1);
        row.push(date);
        row.extend(accounts.iter().map(|account| {
            values
                .get(account)
                .map_or(Cell::Null, |mean| Cell::Float(mean.value()))
        }));
        table.push_row(row);
    }

    table
}

/// Full transform applied to the `equity` table before it is written.
pub fn transform_equity_table(table: &Table) -> ReportResult<Table> {
    let records = exclude_strategy_aggregates(records_from_table(table)?);
    Ok(pivot_equity(&records))
}
