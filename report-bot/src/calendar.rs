//! Trading-date resolution.
//!
//! Reports are named after the most recent trading day under a plain
//! Monday–Friday calendar (no holiday awareness): Monday and Sunday roll back
//! to Friday, every other day uses the previous calendar day.

use chrono::{Datelike, Local, NaiveDate, TimeDelta, Weekday};

/// Offset used on Tuesday through Saturday.
pub const DEFAULT_OFFSET_DAYS: i64 = 1;

/// Resolve the trading date a report built on `today` belongs to.
pub fn resolve_trading_date(today: NaiveDate, default_offset_days: i64) -> NaiveDate {
    let offset = match today.weekday() {
        Weekday::Mon => 3,
        Weekday::Sun => 2,
        _ => default_offset_days,
    };
    today - TimeDelta::days(offset)
}

/// `YYYY-MM-DD` form used in file names.
pub fn format_trading_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// File name of the report for a trading date.
pub fn report_file_name(trading_date: NaiveDate) -> String {
    format!("{}_report.xlsx", format_trading_date(trading_date))
}

/// Today's date in the local timezone.
pub fn today_local() -> NaiveDate {
    Local::now().date_naive()
}
