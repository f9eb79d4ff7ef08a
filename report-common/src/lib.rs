//! Report Common - configuration, logging, errors and retry policy shared by
//! the report bot.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup with an append-only file sink
//! - A fixed-delay retry policy

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod validation;

pub use config::{
    Config, DatabaseConfig, ObservabilityConfig, ReportConfig, ScheduleConfig, TelegramConfig,
};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
    pub use crate::retry::RetryPolicy;
    pub use crate::validation::{Validate, ValidationError};
}
