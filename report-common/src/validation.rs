//! Configuration validation.
//!
//! Catches values that would otherwise surface as an endless retry loop at
//! runtime (bad cron, empty host, missing token) before the service starts.

use std::str::FromStr;
use thiserror::Error;

use crate::config::{
    Config, DatabaseConfig, ObservabilityConfig, ReportConfig, ScheduleConfig, TelegramConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let errors = [
            self.telegram.validate(),
            self.database.validate(),
            self.report.validate(),
            self.schedule.validate(),
            self.observability.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        collect(errors)
    }
}

impl Validate for TelegramConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.bot_token.trim().is_empty() {
            errors.push(ValidationError::missing("telegram.bot_token"));
        }
        if self.channel_id == 0 {
            errors.push(ValidationError::missing("telegram.channel_id"));
        }
        if self.user_id == 0 {
            errors.push(ValidationError::missing("telegram.user_id"));
        }
        if self.command.is_empty() || self.command.starts_with('/') {
            errors.push(ValidationError::invalid(
                "telegram.command",
                "must be a bare command name without '/'",
            ));
        }
        if let Err(e) = regex::Regex::new(&self.keyword_pattern) {
            errors.push(ValidationError::invalid(
                "telegram.keyword_pattern",
                e.to_string(),
            ));
        }

        collect(errors)
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push(ValidationError::missing("database.host"));
        }
        if self.name.trim().is_empty() {
            errors.push(ValidationError::missing("database.name"));
        }
        if self.user.trim().is_empty() {
            errors.push(ValidationError::missing("database.user"));
        }
        if self.port == 0 {
            errors.push(ValidationError::invalid("database.port", "must be non-zero"));
        }
        if self.control_table.trim().is_empty() {
            errors.push(ValidationError::missing("database.control_table"));
        }

        collect(errors)
    }
}

impl Validate for ReportConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.result_folder.as_os_str().is_empty() {
            return Err(ValidationError::missing("report.result_folder"));
        }
        Ok(())
    }
}

impl Validate for ScheduleConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.enabled {
            return Ok(());
        }
        cron::Schedule::from_str(&self.cron)
            .map(|_| ())
            .map_err(|e| ValidationError::invalid("schedule.cron", e.to_string()))
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}
