//! Ticker normalization.
//!
//! Maps whatever the user typed ("600133", "sh600133", "000977.SZ", "aapl")
//! onto a canonical `(code, market)` pair. Normalization never fails.

use super::{Market, StockIdentifier};

/// Leading exchange marker characters ("SH600133", ".SZ000001").
const LEADING_MARKERS: &[char] = &['.', 'S', 'H', 'Z'];

/// Trailing exchange suffixes ("600133.SH", "AAPL.US").
const TRAILING_SUFFIXES: &[&str] = &[".SH", ".SS", ".SZ", ".HK", ".US"];

/// Literal symbols, matched on the whole code before any prefix rule.
const KNOWN_SYMBOLS: &[(&str, Market)] = &[("00700", Market::Hk), ("AAPL", Market::Us)];

/// Leading-digit rules for A-share codes.
const PREFIX_RULES: &[(char, Market)] = &[
    ('6', Market::Shanghai),
    ('5', Market::Shanghai),
    ('9', Market::Shanghai),
    ('0', Market::Shenzhen),
    ('3', Market::Shenzhen),
];

/// Normalize a raw ticker into a `StockIdentifier`.
///
/// Unrecognised codes keep their text and fall back to Shanghai.
pub fn normalize(raw: &str) -> StockIdentifier {
    let code = strip_markers(&raw.trim().to_uppercase());

    if let Some((_, market)) = KNOWN_SYMBOLS.iter().find(|(symbol, _)| *symbol == code) {
        return StockIdentifier::new(code, *market);
    }

    let market = code
        .chars()
        .next()
        .and_then(|first| {
            PREFIX_RULES
                .iter()
                .find(|(prefix, _)| *prefix == first)
                .map(|(_, market)| *market)
        })
        .unwrap_or(Market::Shanghai);

    StockIdentifier::new(code, market)
}

fn strip_markers(upper: &str) -> String {
    let mut code = upper.trim_start_matches(LEADING_MARKERS);
    for suffix in TRAILING_SUFFIXES {
        if let Some(stripped) = code.strip_suffix(suffix) {
            code = stripped;
            break;
        }
    }
    code.to_string()
}
