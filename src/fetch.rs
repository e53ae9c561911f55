// =============================================================================
// Fetch Orchestrator — sequential window-by-window retrieval
// =============================================================================
//
// One request per window, strictly in order, one growing accumulator.  The
// only suspension points are the HTTP call itself, the rate-limit cooldown,
// and the retry backoff.  Nothing here is spawned or shared.
//
// A rejected window (non-success status) is NOT an error: the configured
// `WindowErrorPolicy` decides between the original puller's behavior (treat
// as empty, continue) and retry-with-backoff.  Either way the rejected count
// is surfaced in the outcome, so transient failures never disappear without
// trace.  Zero rows across every window is the distinct `Empty` outcome,
// never an `Err`, so callers can branch without inspecting a table shape.
// =============================================================================

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::binance::rate_limit::{RateLimitTracker, RatePolicy};
use crate::candle::Candle;
use crate::interval::Interval;
use crate::window::Window;

// ---------------------------------------------------------------------------
// The seam to the HTTP collaborator
// ---------------------------------------------------------------------------

/// Reply for one bounded klines request.
#[derive(Debug, Clone)]
pub enum WindowReply {
    /// Successful response, rows decoded.
    Rows {
        candles: Vec<Candle>,
        used_weight: Option<u32>,
    },
    /// Non-success status; the window-error policy decides what happens.
    Rejected {
        status: reqwest::StatusCode,
        used_weight: Option<u32>,
    },
}

/// Source of kline pages.  Implemented by [`crate::binance::BinanceClient`];
/// tests substitute a scripted fake.
// The pipeline is sequential and never spawned, so no Send bound is needed.
#[allow(async_fn_in_trait)]
pub trait KlineSource {
    async fn klines_window(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<WindowReply>;
}

// ---------------------------------------------------------------------------
// Policies and outcome types
// ---------------------------------------------------------------------------

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    2
}

/// What to do with a window the server rejects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WindowErrorPolicy {
    /// Treat the window as empty and continue (the default).
    Skip,
    /// Retry up to `max_attempts` extra times with a fixed backoff, then
    /// treat the window as empty.
    Retry {
        #[serde(default = "default_retry_attempts")]
        max_attempts: u32,
        #[serde(default = "default_retry_backoff")]
        backoff_secs: u64,
    },
}

impl Default for WindowErrorPolicy {
    fn default() -> Self {
        Self::Skip
    }
}

/// Raw table plus run statistics.
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// Concatenation of all windows' rows.  Not assumed sorted or
    /// deduplicated across window boundaries.
    pub candles: Vec<Candle>,
    pub windows_total: usize,
    pub windows_rejected: usize,
    pub requests_sent: u32,
}

/// Result of a whole fetch run.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// At least one row came back.
    Series(FetchReport),
    /// No data in range: every window came back empty or rejected.
    Empty {
        windows_total: usize,
        windows_rejected: usize,
    },
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Fetch every window in order and concatenate the rows.
///
/// # Arguments
/// * `source`    — kline page provider (HTTP client in production).
/// * `windows`   — partitioned request windows, chronological.
/// * `symbol`    — trading-pair symbol, e.g. "BTCUSDT".
/// * `interval`  — kline granularity; its wire token goes into each request.
/// * `page_size` — row cap per request (`limit` query parameter).
/// * `rate`      — cooldown policy fed by a per-run tracker.
/// * `on_error`  — what to do with rejected windows.
pub async fn fetch_all<S: KlineSource>(
    source: &S,
    windows: &[Window],
    symbol: &str,
    interval: &Interval,
    page_size: usize,
    rate: &RatePolicy,
    on_error: &WindowErrorPolicy,
) -> Result<FetchOutcome> {
    let mut tracker = RateLimitTracker::new();
    let mut candles: Vec<Candle> = Vec::new();
    let mut windows_rejected = 0usize;

    info!(
        symbol,
        interval = %interval,
        windows = windows.len(),
        "bulk fetch starting"
    );

    for (i, w) in windows.iter().enumerate() {
        let start_ms = w.start.timestamp_millis();
        let end_ms = w.end.timestamp_millis();

        let mut attempt: u32 = 0;
        let rows = loop {
            let reply = source
                .klines_window(symbol, interval.wire(), start_ms, end_ms, page_size)
                .await?;

            let used_weight = match &reply {
                WindowReply::Rows { used_weight, .. }
                | WindowReply::Rejected { used_weight, .. } => *used_weight,
            };
            tracker.record_request(used_weight, rate);

            if let Some(pause) = tracker.cooldown(rate) {
                info!(
                    window = i + 1,
                    pause_secs = pause.as_secs(),
                    "rate-limit cooldown"
                );
                tokio::time::sleep(pause).await;
                tracker.note_pause();
            }

            match reply {
                WindowReply::Rows { candles: rows, .. } => break Some(rows),
                WindowReply::Rejected { status, .. } => match on_error {
                    WindowErrorPolicy::Skip => {
                        warn!(window = i + 1, %status, "window rejected — treating as empty");
                        break None;
                    }
                    WindowErrorPolicy::Retry {
                        max_attempts,
                        backoff_secs,
                    } => {
                        if attempt < *max_attempts {
                            attempt += 1;
                            warn!(
                                window = i + 1,
                                %status,
                                attempt,
                                max_attempts,
                                "window rejected — retrying"
                            );
                            tokio::time::sleep(Duration::from_secs(*backoff_secs)).await;
                            continue;
                        }
                        warn!(
                            window = i + 1,
                            %status,
                            "window rejected after retries — treating as empty"
                        );
                        break None;
                    }
                },
            }
        };

        match rows {
            Some(rows) => {
                debug!(window = i + 1, rows = rows.len(), "window appended");
                candles.extend(rows);
            }
            None => windows_rejected += 1,
        }
    }

    let requests_sent = tracker.requests_total();

    if candles.is_empty() {
        warn!(
            windows_total = windows.len(),
            windows_rejected, requests_sent, "bulk fetch yielded no rows"
        );
        return Ok(FetchOutcome::Empty {
            windows_total: windows.len(),
            windows_rejected,
        });
    }

    info!(
        rows = candles.len(),
        windows_total = windows.len(),
        windows_rejected,
        requests_sent,
        "bulk fetch complete"
    );

    Ok(FetchOutcome::Series(FetchReport {
        candles,
        windows_total: windows.len(),
        windows_rejected,
        requests_sent,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
