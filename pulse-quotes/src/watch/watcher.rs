//! Watchlist polling loop.

use anyhow::Result;
use chrono::Local;
use pulse_common::WatchConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::alerts::{PriceAlert, TriggeredAlert};
use super::sessions::TradingSessions;
use crate::data::{Quote, QuoteDispatcher, SnapshotCache};

/// Outcome of one pass over the watchlist.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Resolved quotes in watchlist order
    pub quotes: Vec<Quote>,
    /// Raw symbols no resolver could price
    pub failures: Vec<String>,
    /// Alerts crossed during this pass
    pub alerts: Vec<TriggeredAlert>,
}

/// Polls a watchlist during trading hours.
pub struct QuoteWatcher {
    dispatcher: Arc<QuoteDispatcher>,
    cache: Arc<SnapshotCache>,
    symbols: Vec<String>,
    cycle: Duration,
    symbol_delay: Duration,
    sessions: TradingSessions,
    alerts: Vec<PriceAlert>,
}

impl QuoteWatcher {
    pub fn new(
        dispatcher: Arc<QuoteDispatcher>,
        cache: Arc<SnapshotCache>,
        config: &WatchConfig,
    ) -> pulse_common::Result<Self> {
        Ok(Self {
            dispatcher,
            cache,
            symbols: config.symbols.clone(),
            cycle: config.cycle(),
            symbol_delay: config.symbol_delay(),
            sessions: TradingSessions::from_config(&config.sessions)?,
            alerts: config.alerts.iter().map(PriceAlert::from_config).collect(),
        })
    }

    /// Replace the watchlist (e.g. from `--symbol` flags).
    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Resolve every watched symbol once against a fresh snapshot.
    pub async fn run_cycle(&self) -> CycleReport {
        // Each pass starts from fresh market data.
        self.cache.invalidate_all();

        let mut report = CycleReport::default();

        for (i, symbol) in self.symbols.iter().enumerate() {
            if i > 0 && !self.symbol_delay.is_zero() {
                tokio::time::sleep(self.symbol_delay).await;
            }

            let started = Instant::now();
            match self.dispatcher.resolve(symbol).await {
                Some(quote) => {
                    info!(
                        name = %quote.name,
                        code = %quote.code,
                        price = quote.price,
                        change_pct = quote.change_pct,
                        market = %quote.market,
                        source = %quote.source,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Quote"
                    );

                    for alert in &self.alerts {
                        if let Some(hit) = alert.evaluate(&quote) {
                            warn!(
                                name = %hit.name,
                                code = %hit.code,
                                price = hit.price,
                                threshold = hit.threshold,
                                direction = ?hit.direction,
                                "Price alert triggered"
                            );
                            report.alerts.push(hit);
                        }
                    }

                    report.quotes.push(quote);
                }
                None => {
                    warn!(
                        symbol = %symbol,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Quote unavailable"
                    );
                    report.failures.push(symbol.clone());
                }
            }
        }

        report
    }

    /// Poll until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            symbols = self.symbols.len(),
            cycle_secs = self.cycle.as_secs(),
            "Quote watcher started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let now = Local::now().naive_local();
            let wait = if self.sessions.is_trading_time(now) {
                let started = Instant::now();
                let report = self.run_cycle().await;
                info!(
                    resolved = report.quotes.len(),
                    failed = report.failures.len(),
                    alerts = report.alerts.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Cycle complete"
                );
                self.cycle.saturating_sub(started.elapsed())
            } else {
                let wait = self.sessions.next_check_interval(now);
                info!(wait_secs = wait.as_secs(), "Outside trading hours");
                wait
            };

            debug!(wait_ms = wait.as_millis() as u64, "Sleeping until next check");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Quote watcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        Market, ProviderError, QuoteResolver, Snapshot, SnapshotResolver, SnapshotRow,
        SnapshotSource,
    };
    use async_trait::async_trait;
    use pulse_common::{AlertConfig, AlertDirection, CacheConfig, DispatchConfig};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SnapshotSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch_snapshot(&self, _market: Market) -> Result<Snapshot, ProviderError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(Snapshot::new(vec![SnapshotRow {
                code: "600133".into(),
                name: "东湖高新".into(),
                price: 10.95,
                change_pct: 1.2,
                volume: 120000,
            }]))
        }
    }

    fn watcher(source: Arc<CountingSource>, symbols: &[&str]) -> QuoteWatcher {
        let cache = Arc::new(SnapshotCache::new(source, &CacheConfig::default()));
        let resolvers: Vec<Arc<dyn QuoteResolver>> =
            vec![Arc::new(SnapshotResolver::new(Arc::clone(&cache)))];
        let dispatcher = Arc::new(QuoteDispatcher::new(resolvers, &DispatchConfig::default()));

        let config = WatchConfig {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            alerts: vec![AlertConfig {
                symbol: "600133".into(),
                threshold: 10.9,
                direction: AlertDirection::Above,
            }],
            ..Default::default()
        };
        QuoteWatcher::new(dispatcher, cache, &config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_reports_quotes_failures_and_alerts() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let watcher = watcher(source, &["600133", "600999"]);

        let report = watcher.run_cycle().await;

        assert_eq!(report.quotes.len(), 1);
        assert_eq!(report.quotes[0].name, "东湖高新");
        assert_eq!(report.failures, vec!["600999".to_string()]);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].price, 10.95);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_cycle_fetches_fresh_snapshot() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let watcher = watcher(source.clone(), &["600133", "sh600133"]);

        watcher.run_cycle().await;
        assert_eq!(source.calls.load(Ordering::Relaxed), 1);

        watcher.run_cycle().await;
        assert_eq!(source.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_symbol_delay_between_symbols() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let watcher = watcher(source, &["600133", "600133", "600133"]);
        let start = Instant::now();

        watcher.run_cycle().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(1010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let watcher = Arc::new(watcher(source, &["600133"]));
        let (tx, rx) = watch::channel(false);

        let handle = {
            let watcher = Arc::clone(&watcher);
            tokio::spawn(async move { watcher.run(rx).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_with_symbols_overrides_watchlist() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
        });
        let watcher = watcher(source, &["600133"]).with_symbols(vec!["000977".into()]);
        assert_eq!(watcher.symbols(), ["000977".to_string()]);
    }
}
