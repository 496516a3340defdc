//! Eastmoney adapters for A-share market data.
//!
//! # Data Sources
//! - Full-market list: `clist/get`, every listed A-share, paged (snapshot source)
//! - Real-time quote: `stock/get`, one symbol per request (backup resolver)
//!
//! Both endpoints are free and need no API key, but reject requests that do
//! not look like they come from a browser, hence the desktop User-Agent and
//! the data.eastmoney.com referer.

use async_trait::async_trait;
use chrono::Utc;
use pulse_common::{BackupConfig, SnapshotConfig};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{ProviderError, QuoteResolver, SnapshotSource};
use super::retry::{retry_with, RetryPolicy};
use super::{round2, Market, Quote, QuoteSource, Snapshot, SnapshotRow, StockIdentifier};

// ============================================================================
// Constants
// ============================================================================

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const EASTMONEY_REFERER: &str = "https://data.eastmoney.com/";

/// Token accepted by the single-symbol quote endpoint
const QUOTE_UT: &str = "7eea3edcaed734bea9cbfc24409ed989";

/// Token accepted by the full-market list endpoint
const CLIST_UT: &str = "bd1d9ddb04089700cf9c27f6f7426281";

/// Field list requested from the quote endpoint. Only f43, f47, f58, f152 and
/// f170 are read; the endpoint answers faster for the list it is used to.
const QUOTE_FIELDS: &str = "f43,f57,f58,f169,f170,f46,f44,f51,f168,f47,f164,f116,f60,f45,f52,f50,f48,f167,f117,f71,f161,f49,f530,f135,f136,f137,f138,f139,f141,f142,f144,f145,f147,f148,f140,f143,f146,f149,f55,f62,f162,f92,f173,f104,f105,f84,f85,f183,f184,f185,f186,f187,f188,f189,f190,f191,f192,f107,f111,f86,f177,f78,f110,f262,f263,f264,f267,f268,f255,f256,f257,f258,f127,f199,f128,f198,f259,f260,f261,f171,f277,f278,f279,f288,f152,f250,f251,f252,f253,f254,f269,f270,f271,f272,f273,f274,f275,f276,f265,f266,f289,f290,f286,f285,f292,f293,f294,f295";

/// Every A-share board: SZ main, SZ ChiNext, SH main, SH STAR, SZ/BJ.
const CLIST_BOARDS: &str = "m:0 t:6,m:0 t:80,m:1 t:2,m:1 t:23,m:0 t:81 s:2048";

/// code, name, last price, change percent, volume
const CLIST_FIELDS: &str = "f12,f14,f2,f3,f5";

/// Stop paging here even if `total` was never reached.
const CLIST_MAX_PAGES: u32 = 200;

/// Decimal places of price fields when the payload does not say (f152).
const DEFAULT_PRICE_DECIMALS: i32 = 2;

// ============================================================================
// HTTP Client
// ============================================================================

/// Build a client that looks like a desktop browser coming from data.eastmoney.com.
fn build_client(timeout: Duration) -> reqwest::Client {
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, HeaderValue::from_static(EASTMONEY_REFERER));

    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(DESKTOP_USER_AGENT)
        .default_headers(headers)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build eastmoney client, using defaults without browser headers");
            reqwest::Client::new()
        })
}

// ============================================================================
// Symbol Mapping
// ============================================================================

/// Eastmoney market id for `secid`.
fn market_id(market: Market) -> &'static str {
    match market {
        Market::Shanghai => "1",
        Market::Shenzhen => "0",
        Market::Us => "105",
        Market::Hk => "116",
    }
}

/// Convert an identifier to eastmoney `secid` ("1.600133", "105.AAPL").
fn to_secid(id: &StockIdentifier) -> String {
    let code = match id.market {
        Market::Us => id.code.rsplit('.').next().unwrap_or(&id.code),
        _ => id.code.as_str(),
    };
    format!("{}.{}", market_id(id.market), code)
}

/// Query for the single-symbol endpoint. `_` carries epoch millis to defeat caches.
fn quote_params(id: &StockIdentifier, now_millis: i64) -> Vec<(&'static str, String)> {
    vec![
        ("ut", QUOTE_UT.to_string()),
        ("invt", "2".to_string()),
        ("fltt", "1".to_string()),
        ("fields", QUOTE_FIELDS.to_string()),
        ("secid", to_secid(id)),
        ("_", now_millis.to_string()),
    ]
}

// ============================================================================
// Payload Helpers
// ============================================================================

/// Numeric field. Missing or null is `None`; "-" and other text is malformed.
fn number_field(data: &Map<String, Value>, key: &str) -> Result<Option<f64>, ProviderError> {
    match data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| ProviderError::MalformedResponse(format!("{} out of range", key))),
        Some(other) => Err(ProviderError::MalformedResponse(format!(
            "{} is not numeric: {}",
            key, other
        ))),
    }
}

/// Parse a `stock/get` payload into a quote.
///
/// With `fltt=1` prices arrive as integers scaled by `10^f152` and the change
/// percent scaled by 100.
pub(crate) fn parse_quote_payload(
    payload: &Value,
    id: &StockIdentifier,
) -> Result<Quote, ProviderError> {
    let rc = payload
        .get("rc")
        .and_then(Value::as_i64)
        .ok_or_else(|| ProviderError::MalformedResponse("missing rc".into()))?;
    if rc != 0 {
        return Err(ProviderError::MalformedResponse(format!("rc={}", rc)));
    }

    let data = match payload.get("data") {
        Some(Value::Object(data)) if !data.is_empty() => data,
        _ => return Err(ProviderError::NotFound(format!("no data for {}", id))),
    };

    let decimals = number_field(data, "f152")?
        .map(|d| d as i32)
        .unwrap_or(DEFAULT_PRICE_DECIMALS);
    let price_scale = 10f64.powi(decimals);

    let name = data
        .get("f58")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(&id.code)
        .to_string();
    let price = number_field(data, "f43")?.unwrap_or(0.0) / price_scale;
    let change_pct = number_field(data, "f170")?.unwrap_or(0.0) / 100.0;
    let volume = number_field(data, "f47")?.unwrap_or(0.0);

    Ok(Quote {
        code: id.code.clone(),
        name,
        price: round2(price),
        change_pct: round2(change_pct),
        volume: volume.max(0.0) as u64,
        market: id.market,
        source: QuoteSource::Backup,
    })
}

#[derive(Debug, Deserialize)]
struct ClistResponse {
    rc: i64,
    data: Option<ClistData>,
}

#[derive(Debug, Deserialize)]
struct ClistData {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    diff: Value,
}

/// One page of the list.
#[derive(Debug)]
struct ClistPage {
    /// Rows the endpoint says the whole list has
    total: u64,
    /// Rows on this page, suspended ones included
    received: usize,
    rows: Vec<SnapshotRow>,
}

/// Parse one `clist` row. Rows without a numeric price (suspended: "-") are skipped.
fn parse_clist_row(row: &Value) -> Option<SnapshotRow> {
    let row = row.as_object()?;
    let code = row.get("f12")?.as_str()?.to_string();
    let price = row.get("f2")?.as_f64()?;
    let name = row
        .get("f14")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let change_pct = row.get("f3").and_then(Value::as_f64).unwrap_or(0.0);
    let volume = row.get("f5").and_then(Value::as_f64).unwrap_or(0.0);

    Some(SnapshotRow {
        code,
        name,
        price,
        change_pct,
        volume: volume.max(0.0) as u64,
    })
}

/// Parse a `clist` page. `None` when the page carries no data (past the end).
///
/// `diff` is an array with `np=1` and an index-keyed object otherwise.
fn parse_clist_page(body: ClistResponse) -> Result<Option<ClistPage>, ProviderError> {
    if body.rc != 0 {
        return Err(ProviderError::MalformedResponse(format!("rc={}", body.rc)));
    }
    let Some(data) = body.data else {
        return Ok(None);
    };

    let raw_rows: Vec<&Value> = match &data.diff {
        Value::Array(rows) => rows.iter().collect(),
        Value::Object(rows) => rows.values().collect(),
        Value::Null => Vec::new(),
        _ => return Err(ProviderError::MalformedResponse("diff is not a table".into())),
    };

    Ok(Some(ClistPage {
        total: data.total,
        received: raw_rows.len(),
        rows: raw_rows.into_iter().filter_map(parse_clist_row).collect(),
    }))
}

/// Keep the rows listed on `market`.
fn market_snapshot(rows: Vec<SnapshotRow>, market: Market) -> Snapshot {
    let prefixes = market.snapshot_prefixes();
    Snapshot::new(
        rows.into_iter()
            .filter(|row| row.code.starts_with(prefixes))
            .collect(),
    )
}

// ============================================================================
// Snapshot Source
// ============================================================================

/// Full-market snapshot from the eastmoney list endpoint.
///
/// The endpoint caps page sizes, so the list is walked page by page until the
/// advertised `total` has been received.
pub struct EastmoneySnapshotSource {
    client: reqwest::Client,
    endpoint: String,
    page_size: usize,
}

impl EastmoneySnapshotSource {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            client: build_client(config.timeout()),
            endpoint: config.endpoint.clone(),
            page_size: config.page_size.max(1),
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<ClistResponse, ProviderError> {
        let params = [
            ("pn", page.to_string()),
            ("pz", self.page_size.to_string()),
            ("po", "1".to_string()),
            ("np", "1".to_string()),
            ("ut", CLIST_UT.to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fid", "f3".to_string()),
            ("fs", CLIST_BOARDS.to_string()),
            ("fields", CLIST_FIELDS.to_string()),
        ];

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        if response.status() != StatusCode::OK {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        response.json().await.map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse list page {}: {}", page, e))
        })
    }
}

#[async_trait]
impl SnapshotSource for EastmoneySnapshotSource {
    fn name(&self) -> &'static str {
        "eastmoney-clist"
    }

    async fn fetch_snapshot(&self, market: Market) -> Result<Snapshot, ProviderError> {
        // The list only carries A-shares.
        if market.snapshot_prefixes().is_empty() {
            return Ok(Snapshot::empty());
        }

        debug!(endpoint = %self.endpoint, market = %market, page_size = self.page_size, "Fetching full market list");

        let mut rows = Vec::new();
        let mut received: u64 = 0;
        let mut pages = 0;

        for page in 1..=CLIST_MAX_PAGES {
            let body = self.fetch_page(page).await?;
            let Some(chunk) = parse_clist_page(body)? else {
                if page == 1 {
                    return Err(ProviderError::MalformedResponse("missing data".into()));
                }
                break;
            };

            pages = page;
            received += chunk.received as u64;
            rows.extend(chunk.rows);

            if chunk.received == 0 || received >= chunk.total {
                break;
            }
        }

        if pages == CLIST_MAX_PAGES {
            warn!(pages, received, "Market list paging stopped at page limit");
        }
        debug!(market = %market, pages, received, "Fetched market list");

        Ok(market_snapshot(rows, market))
    }
}

// ============================================================================
// Backup Resolver
// ============================================================================

/// Single-symbol quotes from the eastmoney push2 endpoint.
pub struct EastmoneyQuoteResolver {
    client: reqwest::Client,
    endpoint: String,
    transport: RetryPolicy,
    retry_statuses: Vec<u16>,
}

impl EastmoneyQuoteResolver {
    pub fn new(config: &BackupConfig) -> Self {
        Self {
            client: build_client(config.timeout()),
            endpoint: config.endpoint.clone(),
            transport: RetryPolicy::exponential(config.max_attempts, config.backoff_factor()),
            retry_statuses: config.retry_statuses.clone(),
        }
    }

    /// GET the quote payload, retrying transient failures.
    async fn fetch_payload(&self, id: &StockIdentifier) -> Result<Value, ProviderError> {
        let params = quote_params(id, Utc::now().timestamp_millis());
        let params = &params;

        retry_with(
            &self.transport,
            |attempt| async move {
                debug!(symbol = %id.code, secid = %params[4].1, attempt, "Requesting backup quote");

                let response = self
                    .client
                    .get(&self.endpoint)
                    .query(params)
                    .send()
                    .await
                    .map_err(|e| ProviderError::from_reqwest(&e))?;

                if response.status() != StatusCode::OK {
                    return Err(ProviderError::Status(response.status().as_u16()));
                }

                response.json::<Value>().await.map_err(|e| {
                    ProviderError::MalformedResponse(format!("Failed to parse quote: {}", e))
                })
            },
            |e| e.is_transient(&self.retry_statuses),
        )
        .await
    }
}

#[async_trait]
impl QuoteResolver for EastmoneyQuoteResolver {
    fn name(&self) -> &'static str {
        "eastmoney"
    }

    async fn resolve(&self, id: &StockIdentifier) -> Option<Quote> {
        let result = match self.fetch_payload(id).await {
            Ok(payload) => parse_quote_payload(&payload, id),
            Err(e) => Err(e),
        };

        match result {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!(symbol = %id.code, market = %id.market, error = %e, "Backup quote failed");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secid() {
        assert_eq!(to_secid(&StockIdentifier::new("600133", Market::Shanghai)), "1.600133");
        assert_eq!(to_secid(&StockIdentifier::new("000977", Market::Shenzhen)), "0.000977");
        assert_eq!(to_secid(&StockIdentifier::new("00700", Market::Hk)), "116.00700");
        assert_eq!(to_secid(&StockIdentifier::new("NASDAQ.AAPL", Market::Us)), "105.AAPL");
    }

    #[test]
    fn test_quote_params() {
        let params = quote_params(&StockIdentifier::new("000977", Market::Shenzhen), 1_700_000_000_123);
        let keys: Vec<&str> = params.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["ut", "invt", "fltt", "fields", "secid", "_"]);
        assert_eq!(params[4].1, "0.000977");
        assert_eq!(params[5].1, "1700000000123");
        assert!(params[3].1.contains("f170"));
    }

    #[test]
    fn test_parse_scaled_payload() {
        let id = StockIdentifier::new("000977", Market::Shenzhen);
        let payload = json!({"rc": 0, "data": {"f58": "浪潮信息", "f43": 3250, "f170": 85, "f47": 50000}});

        let quote = parse_quote_payload(&payload, &id).unwrap();
        assert_eq!(quote.name, "浪潮信息");
        assert!((quote.price - 32.5).abs() < 1e-9);
        assert!((quote.change_pct - 0.85).abs() < 1e-9);
        assert_eq!(quote.volume, 50000);
        assert_eq!(quote.source, QuoteSource::Backup);
    }

    #[test]
    fn test_parse_respects_price_decimals() {
        let id = StockIdentifier::new("510300", Market::Shanghai);
        let payload = json!({"rc": 0, "data": {"f58": "沪深300ETF", "f43": 3912, "f152": 3, "f170": -12, "f47": 10}});

        let quote = parse_quote_payload(&payload, &id).unwrap();
        assert!((quote.price - 3.91).abs() < 1e-9);
        assert!((quote.change_pct + 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_parse_defaults_name_to_code() {
        let id = StockIdentifier::new("600133", Market::Shanghai);
        let payload = json!({"rc": 0, "data": {"f43": 1085}});

        let quote = parse_quote_payload(&payload, &id).unwrap();
        assert_eq!(quote.name, "600133");
        assert_eq!(quote.volume, 0);
        assert_eq!(quote.change_pct, 0.0);
    }

    #[test]
    fn test_parse_rejects_malformed_payloads() {
        let id = StockIdentifier::new("600133", Market::Shanghai);

        assert!(parse_quote_payload(&json!({"data": {"f43": 1}}), &id).is_err());
        assert!(parse_quote_payload(&json!({"rc": 102, "data": {"f43": 1}}), &id).is_err());
        assert!(parse_quote_payload(&json!({"rc": 0, "data": null}), &id).is_err());
        assert!(parse_quote_payload(&json!({"rc": 0, "data": {}}), &id).is_err());
        assert!(parse_quote_payload(&json!({"rc": 0, "data": {"f43": "-"}}), &id).is_err());
    }

    fn page(body: serde_json::Value) -> Option<ClistPage> {
        let body: ClistResponse = serde_json::from_value(body).unwrap();
        parse_clist_page(body).unwrap()
    }

    #[test]
    fn test_parse_clist_filters_market_and_suspended() {
        let chunk = page(json!({
            "rc": 0,
            "data": {"total": 4, "diff": [
                {"f12": "600133", "f14": "东湖高新", "f2": 10.85, "f3": 1.2, "f5": 120000},
                {"f12": "000977", "f14": "浪潮信息", "f2": 32.5, "f3": 0.85, "f5": 50000},
                {"f12": "600000", "f14": "停牌", "f2": "-", "f3": "-", "f5": "-"},
                {"f12": "900901", "f14": "云赛B股", "f2": 0.35, "f3": 0.0, "f5": 1}
            ]}
        }))
        .unwrap();

        assert_eq!(chunk.total, 4);
        assert_eq!(chunk.received, 4);
        assert_eq!(chunk.rows.len(), 3);

        let snapshot = market_snapshot(chunk.rows, Market::Shanghai);
        let codes: Vec<&str> = snapshot.rows().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["600133", "900901"]);
    }

    #[test]
    fn test_parse_clist_object_diff() {
        let chunk = page(json!({
            "rc": 0,
            "data": {"total": 1, "diff": {"0": {"f12": "300750", "f14": "宁德时代", "f2": 180.1, "f3": 2.0, "f5": 9}}}
        }))
        .unwrap();

        let snapshot = market_snapshot(chunk.rows, Market::Shenzhen);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.rows()[0].name, "宁德时代");
    }

    #[test]
    fn test_parse_clist_past_end_is_none() {
        assert!(page(json!({"rc": 0, "data": null})).is_none());
    }

    #[test]
    fn test_parse_clist_rejects_error_code() {
        let body: ClistResponse = serde_json::from_value(json!({"rc": 1, "data": null})).unwrap();
        assert!(parse_clist_page(body).is_err());
    }
}
