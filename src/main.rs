// =============================================================================
// Aurora Kline Archive — Main Entry Point
// =============================================================================
//
// One-shot bulk pull of historical klines for a single trading pair:
// partition the requested range into page-sized windows, fetch them in
// order, reconcile the gaps the exchange omitted, write the dense series
// to CSV.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod binance;
mod candle;
mod config;
mod error;
mod export;
mod fetch;
mod interval;
mod reconcile;
mod window;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::BinanceClient;
use crate::config::KlinesConfig;
use crate::fetch::FetchOutcome;
use crate::interval::Interval;

const CONFIG_PATH: &str = "klines_config.json";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Aurora Kline Archive — starting up");

    let mut config = KlinesConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        let cfg = KlinesConfig::default();
        // Leave a starter file behind so the next run is editable.
        if !std::path::Path::new(CONFIG_PATH).exists() {
            match cfg.save(CONFIG_PATH) {
                Ok(()) => info!(path = CONFIG_PATH, "starter config written"),
                Err(e) => warn!(error = %e, "failed to write starter config"),
            }
        }
        cfg
    });

    // Override the pull target from env if available.
    if let Ok(v) = std::env::var("AURORA_KLINES_BASE_COIN") {
        config.base_coin = v.trim().to_uppercase();
    }
    if let Ok(v) = std::env::var("AURORA_KLINES_QUOTE_COIN") {
        config.quote_coin = v.trim().to_uppercase();
    }
    if let Ok(v) = std::env::var("AURORA_KLINES_INTERVAL") {
        config.interval = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("AURORA_KLINES_START") {
        config.start_time = v
            .trim()
            .parse()
            .context("AURORA_KLINES_START is not an RFC 3339 timestamp")?;
    }
    if let Ok(v) = std::env::var("AURORA_KLINES_END") {
        config.end_time = v
            .trim()
            .parse()
            .context("AURORA_KLINES_END is not an RFC 3339 timestamp")?;
    }
    if let Ok(v) = std::env::var("AURORA_KLINES_OUTPUT") {
        config.output_path = v;
    }

    let interval = Interval::parse(&config.interval)?;
    let symbol = config.symbol();

    info!(
        symbol = %symbol,
        interval = %interval,
        start = %config.start_time,
        end = %config.end_time,
        "Configured pull"
    );

    // ── 2. Partition the range ───────────────────────────────────────────
    // Fails fast on an inverted range, before any request is issued.
    let windows = window::partition(
        config.start_time,
        config.end_time,
        &interval,
        config.page_size,
    )?;
    info!(
        windows = windows.len(),
        page_size = config.page_size,
        "Request plan ready"
    );

    // ── 3. Fetch window by window ────────────────────────────────────────
    let client = BinanceClient::new();
    let outcome = fetch::fetch_all(
        &client,
        &windows,
        &symbol,
        &interval,
        config.page_size,
        &config.rate,
        &config.window_error_policy,
    )
    .await?;

    let report = match outcome {
        FetchOutcome::Empty {
            windows_total,
            windows_rejected,
        } => {
            warn!(
                windows_total,
                windows_rejected, "No data in range — nothing to write"
            );
            return Ok(());
        }
        FetchOutcome::Series(report) => report,
    };

    // ── 4. Reconcile gaps ────────────────────────────────────────────────
    let (series, recon) = reconcile::reconcile(report.candles, &interval);

    // ── 5. Export ────────────────────────────────────────────────────────
    export::write_csv(&series, &config.output_path)?;

    info!(
        rows = series.len(),
        synthesized = recon.synthesized,
        duplicates_dropped = recon.duplicates_dropped,
        windows_total = report.windows_total,
        windows_rejected = report.windows_rejected,
        requests_sent = report.requests_sent,
        output = %config.output_path,
        "Kline archive complete"
    );

    Ok(())
}
