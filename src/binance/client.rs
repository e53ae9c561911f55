// =============================================================================
// Binance REST API Client — public market-data requests
// =============================================================================
//
// Only the unauthenticated klines endpoint is needed for a bulk historical
// pull, so the client carries no credentials.  A non-success status is data,
// not an error: it is handed back as `WindowReply::Rejected` so that the
// orchestrator's window-error policy decides whether to retry or to treat
// the window as empty.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::candle::Candle;
use crate::fetch::{KlineSource, WindowReply};

/// Binance REST client for public market data.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl BinanceClient {
    /// Create a client against the production endpoint.
    pub fn new() -> Self {
        Self::with_base_url("https://api.binance.com")
    }

    /// Create a client against an alternate base URL (mirror hosts, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        let base_url = base_url.into();
        debug!(base_url = %base_url, "BinanceClient initialised");

        Self { base_url, client }
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl KlineSource for BinanceClient {
    /// GET /api/v3/klines (public — no signature required).
    ///
    /// `start_ms` and `end_ms` are inclusive millisecond epochs.  Returns
    /// the decoded rows together with the `X-MBX-USED-WEIGHT-1M` header
    /// value so the fetch loop can feed its rate-limit tracker.
    #[instrument(skip(self), name = "binance::klines_window")]
    async fn klines_window(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<WindowReply> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&startTime={}&endTime={}&limit={}",
            self.base_url, symbol, interval, start_ms, end_ms, limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let used_weight = resp
            .headers()
            .get("X-MBX-USED-WEIGHT-1M")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u32>().ok());

        if !status.is_success() {
            debug!(%status, "klines window rejected by server");
            return Ok(WindowReply::Rejected {
                status,
                used_weight,
            });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        let raw = body
            .as_array()
            .context("klines response is not an array")?;

        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw {
            match Candle::from_row(entry) {
                Ok(c) => candles.push(c),
                Err(e) => warn!(error = %e, "skipping malformed kline entry"),
            }
        }

        debug!(symbol, interval, count = candles.len(), "klines window fetched");
        Ok(WindowReply::Rows {
            candles,
            used_weight,
        })
    }
}
