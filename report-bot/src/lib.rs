//! Report Bot Library
//!
//! Builds the daily trading report workbook from the reporting database and
//! delivers it through a Telegram bot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────────┐
//! │  Scheduler   │──▶│                  │   │ ReportAssembler│──▶ MySQL
//! │ (cron, chan) │   │  ReportDelivery  │──▶│ (retry 60 s)   │
//! ├──────────────┤   │  (build lock)    │   └────────────────┘
//! │ CommandListen│──▶│                  │──▶ Telegram sendDocument
//! │ (getUpdates) │   └──────────────────┘
//! └──────────────┘
//! ```
//!
//! # Report layout
//!
//! One sheet per account listed in the control table, followed by `SI`,
//! `STATS`, `TICKERS` and `EQUITY`. The equity sheet is pivoted to one
//! column per trade account. The file is named after the last trading day.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod calendar;
pub mod db;
pub mod delivery;
pub mod error;
pub mod report;
pub mod telegram;

use anyhow::{Context, Result};
use report_common::config::Config;
use report_common::RetryPolicy;
use std::sync::Arc;

use crate::db::{ConnectionManager, MySqlConnector};
use crate::delivery::{CommandListener, ReportDelivery, ReportScheduler};
use crate::report::ReportAssembler;
use crate::telegram::TelegramBot;

pub use error::{DeliveryError, ReportError, ReportResult};

/// The running bot: command listener plus scheduler over one delivery coordinator.
pub struct ReporterService {
    bot: Arc<TelegramBot>,
    listener: Arc<CommandListener>,
    scheduler: ReportScheduler,
}

impl ReporterService {
    pub fn new(config: Config) -> Result<Self> {
        let connections = ConnectionManager::new(
            Arc::new(MySqlConnector::new(&config.database)),
            RetryPolicy::forever(config.report.connect_retry_delay()),
        );
        let assembler = ReportAssembler::from_config(connections, &config.report);

        let bot = Arc::new(TelegramBot::from_config(&config.telegram));
        let delivery = Arc::new(ReportDelivery::new(Arc::new(assembler), bot.clone()));

        let listener = CommandListener::from_config(&config.telegram, delivery.clone())
            .context("Invalid report keyword pattern")?;
        let scheduler =
            ReportScheduler::new(&config.schedule, config.telegram.channel_id, delivery)?;

        Ok(Self {
            bot,
            listener: Arc::new(listener),
            scheduler,
        })
    }

    /// Run until either task stops.
    pub async fn start(self) -> Result<()> {
        if let Err(e) = self.bot.verify().await {
            tracing::warn!(error = %e, "Telegram bot verification failed");
        }

        let listener = self.listener;
        let listener_task = tokio::spawn(async move { listener.run().await });

        let scheduler = self.scheduler;
        let scheduler_task = tokio::spawn(async move { scheduler.run().await });

        let (listener_result, scheduler_result) = tokio::try_join!(listener_task, scheduler_task)
            .context("Reporter task panicked")?;
        listener_result?;
        scheduler_result?;
        Ok(())
    }
}
