//! Quote resolution for A-shares.
//!
//! Resolves a raw ticker into a current quote by trying a cached full-market
//! snapshot first and a single-symbol HTTP endpoint second.
//!
//! # Data Sources
//! - **Snapshot** (Primary): full A-share list from eastmoney, cached per market
//! - **Eastmoney quote** (Backup): push2 single-symbol endpoint with transport retry

mod cache;
mod dispatcher;
mod eastmoney;
mod normalizer;
mod provider;
mod retry;
mod snapshot;

pub use cache::{CacheStats, SnapshotCache};
pub use dispatcher::QuoteDispatcher;
pub use eastmoney::{EastmoneyQuoteResolver, EastmoneySnapshotSource};
pub use normalizer::normalize;
pub use provider::{ProviderError, QuoteResolver, SnapshotSource};
pub use retry::{retry_with, Backoff, RetryPolicy};
pub use snapshot::SnapshotResolver;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ============================================================================
// Core Data Types
// ============================================================================

/// Exchange a symbol is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Shanghai Stock Exchange
    Shanghai,
    /// Shenzhen Stock Exchange
    Shenzhen,
    /// Hong Kong Exchange
    Hk,
    /// US exchanges
    Us,
}

impl Market {
    /// Short market tag ("sh", "sz", "hk", "us")
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shanghai => "sh",
            Self::Shenzhen => "sz",
            Self::Hk => "hk",
            Self::Us => "us",
        }
    }

    /// Code prefixes of the market's listings inside the full A-share list.
    ///
    /// HK and US are not part of that list.
    pub fn snapshot_prefixes(&self) -> &'static [char] {
        match self {
            Self::Shanghai => &['6', '5', '9'],
            Self::Shenzhen => &['0', '3'],
            Self::Hk | Self::Us => &[],
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized stock identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockIdentifier {
    /// Canonical code (e.g., "600133")
    pub code: String,
    /// Listing market
    pub market: Market,
}

impl StockIdentifier {
    pub fn new(code: impl Into<String>, market: Market) -> Self {
        Self {
            code: code.into(),
            market,
        }
    }
}

impl fmt::Display for StockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.code, self.market)
    }
}

/// Which resolver produced a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    /// Cached full-market snapshot
    Primary,
    /// Single-symbol backup endpoint
    Backup,
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Backup => f.write_str("backup"),
        }
    }
}

/// Real-time quote produced by a resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Stock code
    pub code: String,
    /// Display name (e.g., "东湖高新")
    pub name: String,
    /// Last price, rounded to 2 decimals
    pub price: f64,
    /// Change from previous close in percent, rounded to 2 decimals
    pub change_pct: f64,
    /// Day's volume in lots (手)
    pub volume: u64,
    /// Listing market
    pub market: Market,
    /// Resolver that produced the quote
    pub source: QuoteSource,
}

impl Quote {
    /// Build a quote from a snapshot row.
    pub fn from_row(row: &SnapshotRow, market: Market, source: QuoteSource) -> Self {
        Self {
            code: row.code.clone(),
            name: row.name.clone(),
            price: round2(row.price),
            change_pct: round2(row.change_pct),
            volume: row.volume,
            market,
            source,
        }
    }
}

/// Round to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Snapshot
// ============================================================================

/// Latest tick of one instrument inside a market snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub change_pct: f64,
    pub volume: u64,
}

/// Full-market table of latest ticks, unique by code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    rows: Vec<SnapshotRow>,
}

impl Snapshot {
    /// Build a snapshot, keeping the first row for any duplicated code.
    pub fn new(rows: Vec<SnapshotRow>) -> Self {
        let mut seen = HashSet::with_capacity(rows.len());
        let rows = rows
            .into_iter()
            .filter(|row| seen.insert(row.code.clone()))
            .collect();
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[SnapshotRow] {
        &self.rows
    }

    /// First row whose code contains `code`, ignoring case.
    pub fn find(&self, code: &str) -> Option<&SnapshotRow> {
        if code.is_empty() {
            return None;
        }
        let needle = code.to_uppercase();
        self.rows
            .iter()
            .find(|row| row.code.to_uppercase().contains(&needle))
    }
}

// ============================================================================
// Tests
// ============================================================================
