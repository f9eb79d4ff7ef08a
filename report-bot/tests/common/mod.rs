//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use report_bot::db::{Cell, Connector, ReportSource, Table};
use report_bot::delivery::ReportBuilder;
use report_bot::report::ReportArtifact;
use report_bot::telegram::{ChatTransport, Document, InboundUpdate, TransportResult};
use report_bot::{ReportError, ReportResult};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2026-10-19, a Monday; reports built on it belong to Friday 2026-10-16.
pub fn monday() -> NaiveDate {
    date(2026, 10, 19)
}

pub fn table(name: &str, columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
    let mut table = Table::new(name, columns.iter().map(|c| c.to_string()).collect());
    for row in rows {
        table.push_row(row);
    }
    table
}

fn connection_refused() -> ReportError {
    ReportError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

// ============================================================================
// Database
// ============================================================================

#[derive(Default)]
struct DatabaseState {
    accounts: Vec<String>,
    tables: HashMap<String, Table>,
    /// Remaining failures per table
    table_failures: HashMap<String, u32>,
}

/// Fake database with connection accounting.
#[derive(Default)]
pub struct FakeDatabase {
    state: Mutex<DatabaseState>,
    connect_failures: AtomicU32,
    pub connects: AtomicU32,
    pub closes: Arc<AtomicU32>,
}

impl FakeDatabase {
    pub fn new(accounts: &[&str]) -> Self {
        Self::default().with_accounts(accounts)
    }

    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        self.state.lock().unwrap().accounts = accounts.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_table(self, table: Table) -> Self {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.name.clone(), table);
        self
    }

    /// Fail the next `count` connection attempts.
    pub fn fail_connects(self, count: u32) -> Self {
        self.connect_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Fail the next `count` reads of `table`.
    pub fn fail_table(self, table: &str, count: u32) -> Self {
        self.state
            .lock()
            .unwrap()
            .table_failures
            .insert(table.to_string(), count);
        self
    }

    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    fn read_table(&self, name: &str) -> ReportResult<Table> {
        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.table_failures.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ReportError::Io(std::io::Error::other(format!(
                    "read of {name} interrupted"
                ))));
            }
        }
        state
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| ReportError::Io(std::io::Error::other(format!("no table {name}"))))
    }
}

/// Connector handing out sources backed by a shared [`FakeDatabase`].
#[derive(Clone)]
pub struct FakeConnector(pub Arc<FakeDatabase>);

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> ReportResult<Box<dyn ReportSource>> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);

        let failures = &self.0.connect_failures;
        if failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(connection_refused());
        }

        Ok(Box::new(FakeSource {
            db: Arc::clone(&self.0),
        }))
    }
}

struct FakeSource {
    db: Arc<FakeDatabase>,
}

#[async_trait]
impl ReportSource for FakeSource {
    async fn fetch_accounts(&mut self) -> ReportResult<Vec<String>> {
        Ok(self.db.state.lock().unwrap().accounts.clone())
    }

    async fn fetch_table(&mut self, table: &str) -> ReportResult<Table> {
        self.db.read_table(table)
    }

    async fn close(self: Box<Self>) -> ReportResult<()> {
        self.db.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// The two-account database used across scenarios.
pub fn sample_database() -> FakeDatabase {
    FakeDatabase::new(&["abc", "xyz"])
        .with_table(table(
            "report_abc",
            &["ticker", "pnl"],
            vec![vec!["AAPL".into(), Cell::Float(12.5)]],
        ))
        .with_table(table(
            "report_xyz",
            &["ticker", "pnl"],
            vec![vec!["MSFT".into(), Cell::Float(-3.0)]],
        ))
        .with_table(table(
            "total_report",
            &["metric", "value"],
            vec![vec!["net_pnl".into(), Cell::Float(9.5)]],
        ))
        .with_table(table(
            "stats",
            &["metric", "value"],
            vec![vec!["sharpe".into(), Cell::Float(1.25)]],
        ))
        .with_table(table(
            "tickers",
            &["ticker", "description"],
            vec![
                vec!["AAPL".into(), "Apple Inc. common stock".into()],
                vec!["MSFT".into(), Cell::Null],
            ],
        ))
        .with_table(table(
            "equity",
            &["date", "trade_account", "strategy", "equity"],
            vec![
                vec![date(2026, 10, 15).into(), "all".into(), "S1".into(), Cell::Float(10.0)],
                vec![date(2026, 10, 15).into(), "abc".into(), "all".into(), Cell::Float(5.0)],
                vec![date(2026, 10, 15).into(), "xyz".into(), "all".into(), Cell::Float(7.0)],
                vec![date(2026, 10, 16).into(), "abc".into(), "all".into(), Cell::Float(6.0)],
            ],
        ))
}

// ============================================================================
// Builder
// ============================================================================

/// Builder writing a small placeholder file, tracking concurrency.
pub struct FakeBuilder {
    dir: PathBuf,
    build_time: Duration,
    fail: bool,
    pub builds: AtomicU32,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeBuilder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            build_time: Duration::ZERO,
            fail: false,
            builds: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_build_time(mut self, build_time: Duration) -> Self {
        self.build_time = build_time;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn build_count(&self) -> u32 {
        self.builds.load(Ordering::SeqCst)
    }
}

pub const FAKE_REPORT_BYTES: &[u8] = b"PK fake workbook";

#[async_trait]
impl ReportBuilder for FakeBuilder {
    async fn build_report(&self) -> ReportResult<ReportArtifact> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.builds.fetch_add(1, Ordering::SeqCst);

        if !self.build_time.is_zero() {
            tokio::time::sleep(self.build_time).await;
        }

        let result = if self.fail {
            Err(ReportError::MissingColumn {
                table: "equity".into(),
                column: "date".into(),
            })
        } else {
            let trading_date = date(2026, 10, 16);
            let path = self.dir.join("2026-10-16_report.xlsx");
            std::fs::write(&path, FAKE_REPORT_BYTES)
                .and_then(|_| std::fs::File::open(&path))
                .map(|file| ReportArtifact {
                    path,
                    trading_date,
                    sheet_names: vec!["SI".into()],
                    file,
                })
                .map_err(ReportError::from)
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Records outbound traffic and replays scripted updates.
#[derive(Default)]
pub struct FakeTransport {
    pub messages: Mutex<Vec<(i64, String)>>,
    pub documents: Mutex<Vec<(i64, Document)>>,
    pub offsets: Mutex<Vec<i64>>,
    updates: Mutex<VecDeque<TransportResult<Vec<InboundUpdate>>>>,
}

impl FakeTransport {
    pub fn with_updates(batches: Vec<TransportResult<Vec<InboundUpdate>>>) -> Self {
        Self {
            updates: Mutex::new(batches.into()),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(i64, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn document_chats(&self) -> Vec<i64> {
        self.documents.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> TransportResult<()> {
        self.messages
            .lock()
            .unwrap()
            .push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, document: Document) -> TransportResult<()> {
        self.documents.lock().unwrap().push((chat_id, document));
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> TransportResult<Vec<InboundUpdate>> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.updates.lock().unwrap().pop_front();
        match next {
            Some(batch) => batch,
            None => {
                tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
                Ok(Vec::new())
            }
        }
    }
}
