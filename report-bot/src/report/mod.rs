//! Report assembly.
//!
//! A build reads the account list from the control table, writes one sheet per
//! account (`report_{account}` → `{ACCOUNT}`), then the four aggregate sheets
//! `SI`, `STATS`, `TICKERS`, `EQUITY`, and saves everything as
//! `{result_folder}/{trading_date}_report.xlsx`. A failed build is retried
//! from scratch after a fixed delay.

pub mod equity;
pub mod sheet;

use chrono::NaiveDate;
use report_common::{ReportConfig, RetryPolicy};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn, Instrument};

use crate::calendar::{report_file_name, resolve_trading_date, today_local, DEFAULT_OFFSET_DAYS};
use crate::db::{ConnectionManager, ReportSource};
use crate::error::{ReportError, ReportResult};

pub use sheet::Sheet;

/// A finished report, opened read-only.
///
/// Whoever receives the artifact owns the file handle; dropping the artifact
/// closes it.
#[derive(Debug)]
pub struct ReportArtifact {
    pub path: PathBuf,
    pub trading_date: NaiveDate,
    pub sheet_names: Vec<String>,
    pub file: File,
}

impl ReportArtifact {
    /// File name without the folder, e.g. `2026-10-16_report.xlsx`.
    pub fn file_name(&self) -> String {
        report_file_name(self.trading_date)
    }

    /// Read the whole file through the open handle, closing it afterwards.
    pub async fn read_all(self) -> std::io::Result<Vec<u8>> {
        let mut file = tokio::fs::File::from_std(self.file);
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}

/// Read every sheet of a report from an open source, in output order.
pub async fn collect_sheets(source: &mut dyn ReportSource) -> ReportResult<Vec<Sheet>> {
    let accounts = source.fetch_accounts().await?;
    let mut sheets = Vec::with_capacity(accounts.len() + sheet::FIXED_TABLES.len());

    for account in &accounts {
        let table = source
            .fetch_table(&sheet::account_table_name(account))
            .await?;
        sheets.push(Sheet::new(sheet::account_sheet_name(account), table));
    }

    for name in sheet::FIXED_TABLES {
        let mut table = source.fetch_table(name).await?;
        if name == sheet::EQUITY_TABLE {
            table = equity::transform_equity_table(&table)?;
        }
        sheets.push(Sheet::new(sheet::fixed_sheet_name(name), table));
    }

    Ok(sheets)
}

/// Log line for a failed build attempt.
pub fn describe_build_error(e: &ReportError) -> String {
    format!("Error generating report: {}: {e}", e.kind())
}

type TodayFn = dyn Fn() -> NaiveDate + Send + Sync;

/// Builds report files.
pub struct ReportAssembler {
    connections: ConnectionManager,
    result_folder: PathBuf,
    policy: RetryPolicy,
    today: Arc<TodayFn>,
}

impl ReportAssembler {
    pub fn new(connections: ConnectionManager, result_folder: PathBuf, policy: RetryPolicy) -> Self {
        Self {
            connections,
            result_folder,
            policy,
            today: Arc::new(today_local),
        }
    }

    /// Assembler using the configured folder and build retry delay.
    pub fn from_config(connections: ConnectionManager, config: &ReportConfig) -> Self {
        Self::new(
            connections,
            config.result_folder.clone(),
            RetryPolicy::forever(config.build_retry_delay()),
        )
    }

    /// Override the clock used to pick the trading date.
    pub fn with_today(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    pub fn result_folder(&self) -> &Path {
        &self.result_folder
    }

    /// Build the report, retrying the whole build until it succeeds.
    pub async fn build(&self) -> ReportResult<ReportArtifact> {
        self.policy
            .run_described("Report build", describe_build_error, |attempt| {
                let span = tracing::info_span!(
                    "report_build",
                    build_id = %uuid::Uuid::new_v4(),
                    attempt
                );
                self.build_once().instrument(span)
            })
            .await
    }

    /// One build attempt. The connection is closed on every exit path.
    async fn build_once(&self) -> ReportResult<ReportArtifact> {
        let mut source = self.connections.connect().await?;
        let result = self.assemble(source.as_mut()).await;

        match source.close().await {
            Ok(()) => info!("Database connection closed"),
            Err(e) => warn!(error = %e, "Failed to close database connection"),
        }

        result
    }

    async fn assemble(&self, source: &mut dyn ReportSource) -> ReportResult<ReportArtifact> {
        let trading_date = resolve_trading_date((self.today)(), DEFAULT_OFFSET_DAYS);
        tokio::fs::create_dir_all(&self.result_folder).await?;
        let path = self.result_folder.join(report_file_name(trading_date));

        let sheets = collect_sheets(source).await?;
        let sheet_names = sheets.iter().map(|s| s.name.clone()).collect();

        let write_path = path.clone();
        tokio::task::spawn_blocking(move || sheet::write_workbook(&write_path, &sheets))
            .await
            .map_err(|e| ReportError::Task(e.to_string()))??;

        let file = File::open(&path)?;
        info!(path = %path.display(), "Report file written");

        Ok(ReportArtifact {
            path,
            trading_date,
            sheet_names,
            file,
        })
    }
}
