//! Watchlist monitoring.
//!
//! ```text
//! QuoteWatcher (tokio sleep)
//!      |
//!      +-- TradingSessions   is the market open?
//!      +-- QuoteDispatcher   one quote per watched symbol
//!      +-- PriceAlert        threshold checks on each quote
//! ```

mod alerts;
mod sessions;
mod watcher;

pub use alerts::{PriceAlert, TriggeredAlert};
pub use sessions::TradingSessions;
pub use watcher::{CycleReport, QuoteWatcher};
