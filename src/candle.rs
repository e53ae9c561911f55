// =============================================================================
// Candle record — one OHLCV row of the kline series
// =============================================================================
//
// The exchange returns each kline as a 12-element JSON array:
//
//   [0] openTime (ms), [1] open, [2] high, [3] low, [4] close, [5] volume,
//   [6] closeTime (ms), [7] quoteAssetVolume, [8] numberOfTrades,
//   [9] takerBuyBaseVolume, [10] takerBuyQuoteVolume, [11] ignore
//
// Price and volume fields arrive as JSON strings.  Locally a candle carries
// second-resolution calendar timestamps (millisecond epochs are integer-
// divided by 1000) and optional activity fields: a record with no activity
// values is a synthesized placeholder for an interval the exchange omitted
// because no trades happened.
// =============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// One kline, fetched or synthesized.
///
/// Invariant for every record, real or placeholder:
/// `close_time == open_time + interval - 1 second`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub close_time: DateTime<Utc>,
    pub quote_asset_volume: Option<f64>,
    pub trade_count: Option<u64>,
    pub taker_buy_base_volume: Option<f64>,
    pub taker_buy_quote_volume: Option<f64>,
    /// Opaque trailing field the exchange documents as ignorable.
    pub ignore: Option<String>,
}

impl Candle {
    /// Decode one wire row.
    ///
    /// Rows shorter than 12 elements are an error; the caller decides
    /// whether to skip or abort.
    pub fn from_row(row: &serde_json::Value) -> Result<Self> {
        let arr = row.as_array().context("kline entry is not an array")?;
        if arr.len() < 12 {
            anyhow::bail!("kline entry has {} elements, expected 12", arr.len());
        }

        let open_time = epoch_ms_to_utc(arr[0].as_i64().context("openTime is not an integer")?)?;
        let close_time = epoch_ms_to_utc(arr[6].as_i64().context("closeTime is not an integer")?)?;

        Ok(Self {
            open_time,
            open: Some(parse_str_f64(&arr[1])?),
            high: Some(parse_str_f64(&arr[2])?),
            low: Some(parse_str_f64(&arr[3])?),
            close: Some(parse_str_f64(&arr[4])?),
            volume: Some(parse_str_f64(&arr[5])?),
            close_time,
            quote_asset_volume: Some(parse_str_f64(&arr[7])?),
            trade_count: Some(arr[8].as_u64().context("numberOfTrades is not an integer")?),
            taker_buy_base_volume: Some(parse_str_f64(&arr[9])?),
            taker_buy_quote_volume: Some(parse_str_f64(&arr[10])?),
            ignore: arr[11].as_str().map(str::to_string),
        })
    }

    /// Synthesize the record for an interval with no observed trading
    /// activity.  Only the two timestamps carry values.
    pub fn placeholder(open_time: DateTime<Utc>, interval: &Interval) -> Self {
        Self {
            open_time,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            close_time: interval.close_time(open_time),
            quote_asset_volume: None,
            trade_count: None,
            taker_buy_base_volume: None,
            taker_buy_quote_volume: None,
            ignore: None,
        }
    }

    /// True for records synthesized by reconciliation ("no trading activity
    /// observed", as opposed to "data unavailable").
    pub fn is_placeholder(&self) -> bool {
        self.open.is_none()
    }
}

/// Millisecond epoch to a second-resolution UTC timestamp (sub-second part
/// truncated).
fn epoch_ms_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ms.div_euclid(1000), 0)
        .with_context(|| format!("epoch millis {ms} out of range"))
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_row() -> serde_json::Value {
        serde_json::json!([
            1700000000000i64,
            "37000.00",
            "37050.00",
            "36990.00",
            "37020.00",
            "123.456",
            1700000059999i64,
            "4567890.12",
            1500,
            "60.123",
            "2224455.66",
            "0"
        ])
    }

    #[test]
    fn decodes_wire_row() {
        let c = Candle::from_row(&sample_row()).expect("should decode");
        assert_eq!(c.open_time.timestamp(), 1_700_000_000);
        // 1700000059999 ms truncates to second resolution.
        assert_eq!(c.close_time.timestamp(), 1_700_000_059);
        assert_eq!(c.open, Some(37000.0));
        assert_eq!(c.close, Some(37020.0));
        assert_eq!(c.trade_count, Some(1500));
        assert_eq!(c.ignore.as_deref(), Some("0"));
        assert!(!c.is_placeholder());
    }

    #[test]
    fn decode_tolerates_numeric_prices() {
        let mut row = sample_row();
        row[1] = serde_json::json!(37000.0);
        let c = Candle::from_row(&row).unwrap();
        assert_eq!(c.open, Some(37000.0));
    }

    #[test]
    fn short_row_is_an_error() {
        let row = serde_json::json!([1700000000000i64, "1.0"]);
        assert!(Candle::from_row(&row).is_err());
    }

    #[test]
    fn non_array_is_an_error() {
        assert!(Candle::from_row(&serde_json::json!({"open": 1.0})).is_err());
    }

    #[test]
    fn placeholder_has_derived_close_and_empty_activity() {
        let iv = Interval::parse("1h").unwrap();
        let open = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        let c = Candle::placeholder(open, &iv);

        assert!(c.is_placeholder());
        assert_eq!(
            c.close_time,
            Utc.with_ymd_and_hms(2024, 3, 1, 2, 59, 59).unwrap()
        );
        assert_eq!(c.open, None);
        assert_eq!(c.volume, None);
        assert_eq!(c.trade_count, None);
        assert_eq!(c.ignore, None);
    }

    #[test]
    fn real_rows_satisfy_the_close_time_invariant() {
        let iv = Interval::parse("1m").unwrap();
        let c = Candle::from_row(&sample_row()).unwrap();
        assert_eq!(c.close_time, iv.close_time(c.open_time));
    }
}
