//! Report Bot - builds the trading report workbook and delivers it over
//! Telegram on schedule or on request.

use anyhow::Result;
use report_bot::ReporterService;
use report_common::prelude::{init_logging, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        config.observability.log_file.as_deref(),
    )?;

    config.validate()?;

    tracing::info!("Reporter v{} started", env!("CARGO_PKG_VERSION"));

    let service = ReporterService::new(config)?;

    tokio::select! {
        result = service.start() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping reporter");
            Ok(())
        }
    }
}
