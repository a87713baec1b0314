use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::QuotesConfig;

/// Price snapshot for a single symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteDetails {
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub previous_close: f64,
    /// Signed: negative when the price fell since the previous close.
    pub change_amount: f64,
    pub change_percent: f64,
}

impl QuoteDetails {
    /// Build a quote from the two prices, deriving change and percent.
    pub fn from_prices(symbol: &str, name: &str, current_price: f64, previous_close: f64) -> Self {
        let change_amount = current_price - previous_close;
        let change_percent = if previous_close != 0.0 {
            change_amount / previous_close * 100.0
        } else {
            0.0
        };
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            current_price,
            previous_close,
            change_amount,
            change_percent,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("symbol not found: {0}")]
    NotFound(String),
    #[error("quote provider error: {0:#}")]
    Provider(anyhow::Error),
}

/// Source of price quotes. One attempt per call, no retries.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn query(&self, symbol: &str) -> Result<QuoteDetails, QuoteError>;
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: String,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

/// Quote lookups against the Yahoo Finance chart endpoint.
pub struct YahooQuoteProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooQuoteProvider {
    pub fn new(config: &QuotesConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("tickerbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build quote HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl QuoteProvider for YahooQuoteProvider {
    async fn query(&self, symbol: &str) -> Result<QuoteDetails, QuoteError> {
        let symbol = symbol.to_ascii_uppercase();
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);

        debug!("Fetching quote: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", "1d")])
            .send()
            .await
            .context("Failed to send quote request")
            .map_err(QuoteError::Provider)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(QuoteError::NotFound(symbol));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuoteError::Provider(anyhow::anyhow!(
                "Quote API error ({}): {}",
                status,
                body
            )));
        }

        let body = response
            .text()
            .await
            .context("Failed to read quote response")
            .map_err(QuoteError::Provider)?;

        parse_chart(&symbol, &body)
    }
}

fn parse_chart(symbol: &str, body: &str) -> Result<QuoteDetails, QuoteError> {
    let parsed: ChartResponse = serde_json::from_str(body)
        .context("Failed to parse quote response")
        .map_err(QuoteError::Provider)?;

    if let Some(err) = parsed.chart.error {
        if err.code.eq_ignore_ascii_case("not found") {
            return Err(QuoteError::NotFound(symbol.to_string()));
        }
        return Err(QuoteError::Provider(anyhow::anyhow!(
            "{}: {}",
            err.code,
            err.description.unwrap_or_default()
        )));
    }

    let meta = parsed
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| QuoteError::NotFound(symbol.to_string()))?;

    let current = meta.regular_market_price.ok_or_else(|| {
        QuoteError::Provider(anyhow::anyhow!("No market price for {}", meta.symbol))
    })?;
    let previous = meta
        .chart_previous_close
        .or(meta.previous_close)
        .ok_or_else(|| {
            QuoteError::Provider(anyhow::anyhow!("No previous close for {}", meta.symbol))
        })?;
    let name = meta
        .long_name
        .or(meta.short_name)
        .unwrap_or_else(|| meta.symbol.clone());

    Ok(QuoteDetails::from_prices(&meta.symbol, &name, current, previous))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Router};

    const AAPL_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "AAPL",
                    "longName": "Apple Inc.",
                    "shortName": "Apple Inc.",
                    "regularMarketPrice": 135.37,
                    "chartPreviousClose": 136.76
                }
            }],
            "error": null
        }
    }"#;

    const NOT_FOUND_CHART: &str = r#"{
        "chart": {
            "result": null,
            "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
        }
    }"#;

    #[test]
    fn test_from_prices_derives_signed_change() {
        let q = QuoteDetails::from_prices("X", "X Corp", 90.0, 100.0);
        assert_eq!(q.change_amount, -10.0);
        assert_eq!(q.change_percent, -10.0);

        let flat = QuoteDetails::from_prices("Z", "Zero", 5.0, 0.0);
        assert_eq!(flat.change_percent, 0.0);
    }

    #[test]
    fn test_parse_chart_success() {
        let q = parse_chart("AAPL", AAPL_CHART).unwrap();
        assert_eq!(q.symbol, "AAPL");
        assert_eq!(q.name, "Apple Inc.");
        assert_eq!(q.current_price, 135.37);
        assert_eq!(q.previous_close, 136.76);
        assert!(q.change_amount < 0.0);
        assert!((q.change_percent - (-1.0164)).abs() < 0.001);
    }

    #[test]
    fn test_parse_chart_falls_back_to_short_name_and_previous_close() {
        let body = r#"{"chart":{"result":[{"meta":{
            "symbol":"GME","shortName":"GameStop","regularMarketPrice":52.4,"previousClose":50.0
        }}],"error":null}}"#;
        let q = parse_chart("GME", body).unwrap();
        assert_eq!(q.name, "GameStop");
        assert_eq!(q.previous_close, 50.0);
    }

    #[test]
    fn test_parse_chart_not_found() {
        assert!(matches!(
            parse_chart("ZZZZ", NOT_FOUND_CHART),
            Err(QuoteError::NotFound(s)) if s == "ZZZZ"
        ));
        assert!(matches!(
            parse_chart("ZZZZ", r#"{"chart":{"result":[],"error":null}}"#),
            Err(QuoteError::NotFound(_))
        ));
    }

    #[test]
    fn test_parse_chart_garbage_is_provider_error() {
        assert!(matches!(
            parse_chart("AAPL", "<html>oops</html>"),
            Err(QuoteError::Provider(_))
        ));
        let no_price = r#"{"chart":{"result":[{"meta":{"symbol":"AAPL"}}],"error":null}}"#;
        assert!(matches!(
            parse_chart("AAPL", no_price),
            Err(QuoteError::Provider(_))
        ));
    }

    async fn spawn_chart_server() -> String {
        async fn chart(Path(symbol): Path<String>) -> (StatusCode, &'static str) {
            match symbol.as_str() {
                "AAPL" => (StatusCode::OK, AAPL_CHART),
                "BOOM" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream down"),
                _ => (StatusCode::NOT_FOUND, NOT_FOUND_CHART),
            }
        }

        let app = Router::new().route("/v8/finance/chart/{symbol}", get(chart));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn provider(base_url: String) -> YahooQuoteProvider {
        YahooQuoteProvider::new(&QuotesConfig {
            base_url,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_query_uppercases_symbol() {
        let provider = provider(spawn_chart_server().await);
        let q = provider.query("aapl").await.unwrap();
        assert_eq!(q.symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_query_not_found_and_server_error() {
        let provider = provider(spawn_chart_server().await);
        assert!(matches!(
            provider.query("nope").await,
            Err(QuoteError::NotFound(_))
        ));
        assert!(matches!(
            provider.query("boom").await,
            Err(QuoteError::Provider(_))
        ));
    }
}
