// =============================================================================
// Pull Configuration — what to fetch, how to pace it, where to write it
// =============================================================================
//
// One JSON file describes a complete pull: the pair, the inclusive time
// range, the interval token, and the pacing/error policies.  All fields
// carry `#[serde(default)]` so that adding new fields never breaks loading
// an older config file.  Persistence uses an atomic tmp + rename pattern to
// prevent corruption on crash.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::binance::rate_limit::RatePolicy;
use crate::fetch::WindowErrorPolicy;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_base_coin() -> String {
    "BTC".to_string()
}

fn default_quote_coin() -> String {
    "USDT".to_string()
}

fn default_start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid literal date")
}

fn default_end_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0)
        .single()
        .expect("valid literal date")
}

fn default_interval() -> String {
    "1m".to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_output_path() -> String {
    "klines.csv".to_string()
}

// =============================================================================
// KlinesConfig
// =============================================================================

/// Top-level configuration for one bulk pull.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlinesConfig {
    // --- Trading pair --------------------------------------------------------
    /// Base asset, e.g. "BTC".  Concatenated with `quote_coin` to form the
    /// exchange symbol.
    #[serde(default = "default_base_coin")]
    pub base_coin: String,

    /// Quote asset, e.g. "USDT".
    #[serde(default = "default_quote_coin")]
    pub quote_coin: String,

    // --- Range & granularity -------------------------------------------------
    /// First instant of the range (inclusive), RFC 3339.
    #[serde(default = "default_start_time")]
    pub start_time: DateTime<Utc>,

    /// Last instant of the range (inclusive), RFC 3339.
    #[serde(default = "default_end_time")]
    pub end_time: DateTime<Utc>,

    /// Interval wire token, e.g. "1m", "1h", "1M".
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Rows per request; also the window size in interval boundaries.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    // --- Policies ------------------------------------------------------------
    /// Rate-limit pacing.
    #[serde(default)]
    pub rate: RatePolicy,

    /// Handling of server-rejected windows.
    #[serde(default)]
    pub window_error_policy: WindowErrorPolicy,

    // --- Output --------------------------------------------------------------
    /// Path of the CSV the reconciled series is written to.
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

impl Default for KlinesConfig {
    fn default() -> Self {
        Self {
            base_coin: default_base_coin(),
            quote_coin: default_quote_coin(),
            start_time: default_start_time(),
            end_time: default_end_time(),
            interval: default_interval(),
            page_size: default_page_size(),
            rate: RatePolicy::default(),
            window_error_policy: WindowErrorPolicy::default(),
            output_path: default_output_path(),
        }
    }
}

impl KlinesConfig {
    /// The exchange symbol, e.g. "BTCUSDT".
    pub fn symbol(&self) -> String {
        format!(
            "{}{}",
            self.base_coin.to_uppercase(),
            self.quote_coin.to_uppercase()
        )
    }

    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbol = %config.symbol(),
            interval = %config.interval,
            "config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content =
            serde_json::to_string_pretty(self).context("failed to serialise config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "config saved (atomic)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = KlinesConfig::default();
        assert_eq!(cfg.base_coin, "BTC");
        assert_eq!(cfg.quote_coin, "USDT");
        assert_eq!(cfg.symbol(), "BTCUSDT");
        assert_eq!(cfg.interval, "1m");
        assert_eq!(cfg.page_size, 1000);
        assert_eq!(cfg.rate.pause_after_requests, 1000);
        assert!(matches!(
            cfg.window_error_policy,
            WindowErrorPolicy::Skip
        ));
        assert_eq!(cfg.output_path, "klines.csv");
        assert!(cfg.start_time < cfg.end_time);
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: KlinesConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbol(), "BTCUSDT");
        assert_eq!(cfg.page_size, 1000);
        assert_eq!(cfg.rate.cooldown_secs, 60);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "base_coin": "eth",
            "interval": "1h",
            "start_time": "2023-06-01T00:00:00Z",
            "end_time": "2023-07-01T00:00:00Z"
        }"#;
        let cfg: KlinesConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbol(), "ETHUSDT"); // lowercase input uppercased
        assert_eq!(cfg.interval, "1h");
        assert_eq!(cfg.page_size, 1000);
        assert_eq!(
            cfg.start_time,
            Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = KlinesConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: KlinesConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.symbol(), cfg2.symbol());
        assert_eq!(cfg.start_time, cfg2.start_time);
        assert_eq!(cfg.end_time, cfg2.end_time);
        assert_eq!(cfg.page_size, cfg2.page_size);
    }

    #[test]
    fn retry_policy_loads_from_json() {
        let json = r#"{ "window_error_policy": { "mode": "retry", "max_attempts": 4 } }"#;
        let cfg: KlinesConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(
            cfg.window_error_policy,
            WindowErrorPolicy::Retry { max_attempts: 4, .. }
        ));
    }
}
