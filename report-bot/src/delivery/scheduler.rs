//! Cron-driven weekly delivery.
//!
//! The default schedule `0 0 11 * * Tue-Sat` fires at 11:00 local time on the
//! mornings after each trading day and sends the report to the channel.
//!
//! ```json
//! {
//!   "schedule": {
//!     "enabled": true,
//!     "cron": "0 0 11 * * Tue-Sat"
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use report_common::ScheduleConfig;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use super::ReportDelivery;

type ClockFn = dyn Fn() -> DateTime<Local> + Send + Sync;

/// Sends the report to the channel on a cron schedule.
pub struct ReportScheduler {
    enabled: bool,
    expression: String,
    schedule: Schedule,
    channel_id: i64,
    delivery: Arc<ReportDelivery>,
    clock: Arc<ClockFn>,
}

impl ReportScheduler {
    pub fn new(
        config: &ScheduleConfig,
        channel_id: i64,
        delivery: Arc<ReportDelivery>,
    ) -> Result<Self> {
        let schedule = Schedule::from_str(&config.cron)
            .with_context(|| format!("Invalid schedule cron: {}", config.cron))?;

        Ok(Self {
            enabled: config.enabled,
            expression: config.cron.clone(),
            schedule,
            channel_id,
            delivery,
            clock: Arc::new(Local::now),
        })
    }

    /// Override the wall clock the schedule is evaluated against.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> DateTime<Local> {
        (self.clock)()
    }

    /// First fire strictly after `after`.
    pub fn next_fire_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }

    /// The next `count` fires after `after`.
    pub fn upcoming<Tz: TimeZone>(&self, after: &DateTime<Tz>, count: usize) -> Vec<DateTime<Tz>> {
        self.schedule.after(after).take(count).collect()
    }

    /// One scheduled delivery to the channel.
    pub async fn run_scheduled(&self) {
        let chat_id = self.channel_id;
        match self.delivery.deliver(chat_id).await {
            Ok(file_name) => {
                info!(file = %file_name, "Schedule report has been sent, id: {chat_id}");
            }
            Err(e) => error!(chat_id, error = %e, "Scheduled report delivery failed"),
        }
    }

    /// Run the scheduler loop until the task is cancelled.
    ///
    /// Fires missed while a delivery was running are not caught up; the next
    /// fire is always computed from the current time.
    pub async fn run(&self) -> Result<()> {
        if !self.enabled {
            info!("Scheduler disabled, not starting");
            return Ok(());
        }

        let Some(mut next) = self.next_fire_after(&self.now()) else {
            info!(cron = %self.expression, "Schedule has no upcoming fires");
            return Ok(());
        };
        info!(cron = %self.expression, next = %next, "Scheduler started");

        let mut check_interval = interval(Duration::from_secs(1));
        check_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            check_interval.tick().await;

            if self.now() < next {
                continue;
            }

            self.run_scheduled().await;

            match self.next_fire_after(&self.now()) {
                Some(fire) => {
                    info!(next = %fire, "Next scheduled report");
                    next = fire;
                }
                None => {
                    info!("Schedule exhausted");
                    return Ok(());
                }
            }
        }
    }
}
