// =============================================================================
// CSV export of the reconciled series
// =============================================================================
//
// Column names follow the exchange's kline field order.  Placeholder records
// serialize their activity fields as empty cells, so "no trading activity"
// stays visibly distinct from a zero.  The write is atomic (tmp + rename).
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::candle::Candle;

const HEADER: [&str; 12] = [
    "Open-Time",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "Close-Time",
    "Quote-Asset-Value",
    "Number-of-Trades",
    "Taker-Buy-Base-Asset-Volume",
    "Taker-Buy-Quote-Asset-Volume",
    "Ignore",
];

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Write `series` to a CSV file at `path` (tmp + rename).
pub fn write_csv(series: &[Candle], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension("csv.tmp");

    let mut wtr = csv::Writer::from_path(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    wtr.write_record(HEADER)
        .context("failed to write CSV header")?;

    for c in series {
        wtr.write_record([
            c.open_time.format(DATE_FORMAT).to_string(),
            opt_f64(c.open),
            opt_f64(c.high),
            opt_f64(c.low),
            opt_f64(c.close),
            opt_f64(c.volume),
            c.close_time.format(DATE_FORMAT).to_string(),
            opt_f64(c.quote_asset_volume),
            c.trade_count.map(|n| n.to_string()).unwrap_or_default(),
            opt_f64(c.taker_buy_base_volume),
            opt_f64(c.taker_buy_quote_volume),
            c.ignore.clone().unwrap_or_default(),
        ])
        .context("failed to write CSV row")?;
    }

    wtr.flush().context("failed to flush CSV writer")?;
    drop(wtr);

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename tmp CSV to {}", path.display()))?;

    let placeholders = series.iter().filter(|c| c.is_placeholder()).count();
    info!(
        rows = series.len(),
        placeholders,
        path = %path.display(),
        "series exported"
    );
    Ok(())
}

fn opt_f64(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use chrono::{TimeZone, Utc};

    fn sample_series() -> Vec<Candle> {
        let iv = Interval::parse("1h").unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let t1 = iv.advance(t0);
        let real = Candle {
            open_time: t0,
            open: Some(100.0),
            high: Some(101.5),
            low: Some(99.0),
            close: Some(100.5),
            volume: Some(12.0),
            close_time: iv.close_time(t0),
            quote_asset_volume: Some(1200.0),
            trade_count: Some(42),
            taker_buy_base_volume: Some(6.0),
            taker_buy_quote_volume: Some(600.0),
            ignore: Some("0".into()),
        };
        vec![real, Candle::placeholder(t1, &iv)]
    }

    #[test]
    fn writes_header_and_rows() {
        let path = std::env::temp_dir().join("aurora_klines_export_rows.csv");
        write_csv(&sample_series(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Open-Time,Open,High,Low,Close,Volume,Close-Time,Quote-Asset-Value,\
             Number-of-Trades,Taker-Buy-Base-Asset-Volume,Taker-Buy-Quote-Asset-Volume,Ignore"
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("2024-03-01T00:00:00,100,"));
        assert!(first.contains("2024-03-01T00:59:59"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn placeholder_rows_have_empty_activity_cells() {
        let path = std::env::temp_dir().join("aurora_klines_export_placeholder.csv");
        write_csv(&sample_series(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let placeholder_line = content.lines().nth(2).unwrap();
        assert_eq!(
            placeholder_line,
            "2024-03-01T01:00:00,,,,,,2024-03-01T01:59:59,,,,,"
        );

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let path = std::env::temp_dir().join("aurora_klines_export_tmp.csv");
        write_csv(&sample_series(), &path).unwrap();
        assert!(!path.with_extension("csv.tmp").exists());
        std::fs::remove_file(&path).ok();
    }
}
