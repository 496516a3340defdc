//! Configuration validation for Pulse services.
//!
//! Provides validation logic for configuration fields to ensure
//! all values are present and within valid ranges.

use chrono::NaiveTime;
use thiserror::Error;

use crate::config::{
    BackupConfig, CacheConfig, Config, DispatchConfig, ObservabilityConfig, SessionsConfig,
    SnapshotConfig, WatchConfig,
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

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        reason: reason.into(),
    }
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let sections: [&dyn Validate; 6] = [
            &self.observability,
            &self.quotes.cache,
            &self.quotes.dispatch,
            &self.quotes.snapshot,
            &self.quotes.backup,
            &self.watch,
        ];

        let mut errors: Vec<ValidationError> = sections
            .iter()
            .filter_map(|section| section.validate().err())
            .collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load and validate configuration.
    pub fn load_and_validate() -> anyhow::Result<Self> {
        let config = Self::load_with_env()?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(invalid(
                "observability.log_level",
                format!("expected one of {:?}", LEVELS),
            ));
        }

        if self.log_format != "json" && self.log_format != "pretty" {
            return Err(invalid(
                "observability.log_format",
                "expected \"json\" or \"pretty\"",
            ));
        }

        Ok(())
    }
}

impl Validate for CacheConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.capacity == 0 {
            return Err(invalid("quotes.cache.capacity", "must be greater than 0"));
        }
        if self.ttl_secs == 0 {
            return Err(invalid("quotes.cache.ttl_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Validate for DispatchConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.attempts_per_resolver == 0 {
            return Err(invalid(
                "quotes.dispatch.attempts_per_resolver",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Validate for SnapshotConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "quotes.snapshot.endpoint".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(invalid("quotes.snapshot.timeout_secs", "must be greater than 0"));
        }
        if self.page_size == 0 {
            return Err(invalid("quotes.snapshot.page_size", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Validate for BackupConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "quotes.backup.endpoint".into(),
            });
        }
        if self.max_attempts == 0 {
            return Err(invalid("quotes.backup.max_attempts", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("quotes.backup.timeout_secs", "must be greater than 0"));
        }
        if let Some(status) = self.retry_statuses.iter().find(|s| !(100..=599).contains(*s)) {
            return Err(invalid(
                "quotes.backup.retry_statuses",
                format!("{} is not an HTTP status", status),
            ));
        }
        Ok(())
    }
}

impl Validate for SessionsConfig {
    fn validate(&self) -> ValidationResult<()> {
        let fields = [
            ("watch.sessions.morning_open", &self.morning_open),
            ("watch.sessions.morning_close", &self.morning_close),
            ("watch.sessions.afternoon_open", &self.afternoon_open),
            ("watch.sessions.afternoon_close", &self.afternoon_close),
        ];

        let mut times = Vec::with_capacity(fields.len());
        for (field, value) in fields {
            let time = NaiveTime::parse_from_str(value, "%H:%M")
                .map_err(|_| invalid(field, format!("'{}' is not HH:MM", value)))?;
            times.push(time);
        }

        if times.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(invalid(
                "watch.sessions",
                "session bounds must be strictly increasing",
            ));
        }

        Ok(())
    }
}

impl Validate for WatchConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.cycle_secs == 0 {
            return Err(invalid("watch.cycle_secs", "must be greater than 0"));
        }

        self.sessions.validate()?;

        for alert in &self.alerts {
            if alert.symbol.trim().is_empty() {
                return Err(ValidationError::MissingField {
                    field: "watch.alerts[].symbol".into(),
                });
            }
            if !alert.threshold.is_finite() || alert.threshold <= 0.0 {
                return Err(invalid(
                    "watch.alerts[].threshold",
                    format!("{} for {} must be a positive price", alert.threshold, alert.symbol),
                ));
            }
        }

        Ok(())
    }
}
