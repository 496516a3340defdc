//! Primary resolver: lookup inside the cached full-market snapshot.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::SnapshotCache;
use super::provider::QuoteResolver;
use super::{Quote, QuoteSource, StockIdentifier};

/// Resolves quotes from the market snapshot held by a `SnapshotCache`.
pub struct SnapshotResolver {
    cache: Arc<SnapshotCache>,
}

impl SnapshotResolver {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl QuoteResolver for SnapshotResolver {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn resolve(&self, id: &StockIdentifier) -> Option<Quote> {
        let snapshot = match self.cache.get_or_fetch(id.market).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(symbol = %id.code, market = %id.market, error = %e, "Snapshot fetch failed");
                return None;
            }
        };

        match snapshot.find(&id.code) {
            Some(row) => Some(Quote::from_row(row, id.market, QuoteSource::Primary)),
            None => {
                debug!(
                    symbol = %id.code,
                    market = %id.market,
                    rows = snapshot.len(),
                    "Symbol not in snapshot"
                );
                None
            }
        }
    }
}
