//! Pulse Quotes Library
//!
//! Resolves A-share tickers into real-time quotes and polls a watchlist
//! during trading hours.
//!
//! # Architecture
//!
//! ```text
//!            raw ticker
//!                |
//!            normalize
//!                |
//!         QuoteDispatcher ----------------------------+
//!                |                                    |
//!       SnapshotResolver (primary)        EastmoneyQuoteResolver (backup)
//!                |                                    |
//!         SnapshotCache (TTL + LRU)            push2 stock/get
//!                |                             (transport retry)
//!      EastmoneySnapshotSource
//!         push2 clist/get
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod watch;

use pulse_common::config::Config;
use std::sync::Arc;
use tracing::info;

use crate::data::{
    CacheStats, EastmoneyQuoteResolver, EastmoneySnapshotSource, Quote, QuoteDispatcher,
    QuoteResolver, SnapshotCache, SnapshotResolver, SnapshotSource,
};
use crate::watch::QuoteWatcher;

/// Quote service: one cache, one dispatcher and a watcher sharing them.
pub struct QuoteService {
    cache: Arc<SnapshotCache>,
    dispatcher: Arc<QuoteDispatcher>,
    config: Config,
}

impl QuoteService {
    /// Wire the eastmoney sources from configuration.
    pub fn new(config: Config) -> Self {
        let source: Arc<dyn SnapshotSource> =
            Arc::new(EastmoneySnapshotSource::new(&config.quotes.snapshot));
        let backup: Arc<dyn QuoteResolver> =
            Arc::new(EastmoneyQuoteResolver::new(&config.quotes.backup));
        Self::with_sources(config, source, backup)
    }

    /// Wire custom sources; the snapshot resolver is always tried first.
    pub fn with_sources(
        config: Config,
        source: Arc<dyn SnapshotSource>,
        backup: Arc<dyn QuoteResolver>,
    ) -> Self {
        let cache = Arc::new(SnapshotCache::new(source, &config.quotes.cache));
        let primary: Arc<dyn QuoteResolver> = Arc::new(SnapshotResolver::new(Arc::clone(&cache)));
        let dispatcher = Arc::new(QuoteDispatcher::new(
            vec![primary, backup],
            &config.quotes.dispatch,
        ));

        info!(
            cache_capacity = config.quotes.cache.capacity,
            cache_ttl_secs = config.quotes.cache.ttl_secs,
            "Quote service initialized"
        );

        Self {
            cache,
            dispatcher,
            config,
        }
    }

    /// Resolve one raw ticker.
    pub async fn resolve(&self, raw: &str) -> Option<Quote> {
        self.dispatcher.resolve(raw).await
    }

    /// Build a watcher over the configured watchlist.
    pub fn watcher(&self) -> pulse_common::Result<QuoteWatcher> {
        QuoteWatcher::new(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.cache),
            &self.config.watch,
        )
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
