//! Pulse Common - Shared types, utilities, and configuration for the Pulse quote services.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    AlertConfig, AlertDirection, BackupConfig, CacheConfig, Config, DispatchConfig,
    ObservabilityConfig, QuotesConfig, SessionsConfig, SnapshotConfig, WatchConfig,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, QuotesConfig, WatchConfig};
    pub use crate::error::{Error, Result};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
