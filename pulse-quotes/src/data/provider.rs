//! Resolver and snapshot source abstractions.
//!
//! Defines the `QuoteResolver` trait the dispatcher composes and the
//! `SnapshotSource` trait behind the snapshot cache.

use async_trait::async_trait;
use std::fmt;

use super::{Market, Quote, Snapshot, StockIdentifier};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors raised inside a data source.
///
/// These never cross the resolver boundary: resolvers log them and report a miss.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Non-success HTTP status
    Status(u16),
    /// Unexpected payload shape or unparsable field
    MalformedResponse(String),
    /// Symbol absent from the data set
    NotFound(String),
    /// Provider cannot serve the request at all
    Unavailable(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Status(code) => write!(f, "HTTP status {}", code),
            Self::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            Self::NotFound(msg) => write!(f, "Not found: {}", msg),
            Self::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Build from a reqwest error, keeping timeouts recognisable in logs.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("timeout: {}", err))
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }

    /// Check if a transport-level retry may help.
    ///
    /// Statuses are retried only when listed in `retry_statuses`.
    pub fn is_transient(&self, retry_statuses: &[u16]) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status(code) => retry_statuses.contains(code),
            _ => false,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A strategy that attempts to produce a quote from one data source.
#[async_trait]
pub trait QuoteResolver: Send + Sync {
    /// Resolver name for logging (e.g., "snapshot", "eastmoney")
    fn name(&self) -> &'static str;

    /// Resolve a normalized identifier; `None` on any miss or failure.
    async fn resolve(&self, id: &StockIdentifier) -> Option<Quote>;
}

/// Source of full-market snapshots.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// Fetch the whole table of latest ticks for a market.
    async fn fetch_snapshot(&self, market: Market) -> Result<Snapshot, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
