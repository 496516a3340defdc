//! Quote dispatcher for multi-resolver failover.
//!
//! Tries each resolver in order. Every miss sleeps `step * attempt` before the
//! next call, so the wait grows within a resolver's budget. The first quote
//! produced is returned.

use pulse_common::DispatchConfig;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::normalizer::normalize;
use super::provider::QuoteResolver;
use super::retry::RetryPolicy;
use super::{Quote, StockIdentifier};

/// Routes quote requests through an ordered list of resolvers.
pub struct QuoteDispatcher {
    /// Resolvers in priority order
    resolvers: Vec<Arc<dyn QuoteResolver>>,
    /// Attempts and backoff per resolver
    policy: RetryPolicy,
}

impl QuoteDispatcher {
    pub fn new(resolvers: Vec<Arc<dyn QuoteResolver>>, config: &DispatchConfig) -> Self {
        let names: Vec<&str> = resolvers.iter().map(|r| r.name()).collect();
        info!(resolvers = ?names, attempts = config.attempts_per_resolver, "Quote dispatcher ready");

        Self {
            resolvers,
            policy: RetryPolicy::linear(config.attempts_per_resolver, config.backoff_step()),
        }
    }

    /// Normalize `raw` and resolve it. `None` when every resolver misses.
    pub async fn resolve(&self, raw: &str) -> Option<Quote> {
        let id = normalize(raw);
        debug!(raw, symbol = %id, "Normalized symbol");
        self.resolve_identifier(&id).await
    }

    /// Resolve an already normalized identifier.
    pub async fn resolve_identifier(&self, id: &StockIdentifier) -> Option<Quote> {
        let started = Instant::now();

        for resolver in &self.resolvers {
            let name = resolver.name();

            for attempt in 1..=self.policy.max_attempts {
                if let Some(quote) = resolver.resolve(id).await {
                    debug!(
                        resolver = name,
                        symbol = %id,
                        attempt,
                        price = quote.price,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Resolved quote"
                    );
                    return Some(quote);
                }

                // Every miss backs off, the last one included.
                let delay = self.policy.backoff.delay(attempt);
                debug!(
                    resolver = name,
                    symbol = %id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Resolver missed"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(resolver = name, symbol = %id, "Resolver exhausted, failing over");
        }

        warn!(
            symbol = %id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "All resolvers failed"
        );
        None
    }

    /// Resolver names in call order.
    pub fn resolver_names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
