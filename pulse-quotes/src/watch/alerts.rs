//! Price threshold alerts.

use pulse_common::{AlertConfig, AlertDirection};
use serde::Serialize;

use crate::data::{normalize, Quote, StockIdentifier};

/// A threshold on one symbol's last price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAlert {
    pub symbol: StockIdentifier,
    pub threshold: f64,
    pub direction: AlertDirection,
}

/// An alert whose threshold was crossed by a quote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredAlert {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub threshold: f64,
    pub direction: AlertDirection,
}

impl PriceAlert {
    pub fn from_config(config: &AlertConfig) -> Self {
        Self {
            symbol: normalize(&config.symbol),
            threshold: config.threshold,
            direction: config.direction,
        }
    }

    /// Check a quote against this alert. Quotes for other symbols never trigger.
    pub fn evaluate(&self, quote: &Quote) -> Option<TriggeredAlert> {
        if quote.code != self.symbol.code || quote.market != self.symbol.market {
            return None;
        }

        let crossed = match self.direction {
            AlertDirection::Above => quote.price >= self.threshold,
            AlertDirection::Below => quote.price <= self.threshold,
        };

        crossed.then(|| TriggeredAlert {
            code: quote.code.clone(),
            name: quote.name.clone(),
            price: quote.price,
            threshold: self.threshold,
            direction: self.direction,
        })
    }
}
