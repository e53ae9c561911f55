// =============================================================================
// Interval — exchange kline granularity with calendar-aware stepping
// =============================================================================
//
// The exchange identifies granularities by a wire token ("1m", "4h", "1M").
// Locally the same interval also needs a calendar-arithmetic form so that
// boundary sequences can be generated: month-unit intervals step by calendar
// months (end-of-month aware), every other unit is a fixed duration.
//
// Boundary generation and close-time derivation MUST share one stepping
// primitive; both go through `Interval::step_from`.
// =============================================================================

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KlineError;

/// Granularity unit of a kline interval.
///
/// `Months` is the only calendar-stepped unit; the rest map to fixed
/// durations.  The wire token's trailing letter is case-sensitive: `m` is
/// minutes, `M` is months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
}

/// A parsed kline interval.
///
/// Keeps the original wire token (sent verbatim in request URLs) alongside
/// the `(count, unit)` form used for local date arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    token: String,
    count: u32,
    unit: IntervalUnit,
}

impl Interval {
    /// Parse a wire token such as `"1m"`, `"12h"`, `"1M"`.
    ///
    /// The parse is purely syntactic (digits followed by one unit letter).
    /// Whether the exchange actually supports the token is not checked.
    pub fn parse(token: &str) -> Result<Self, KlineError> {
        let bad = || KlineError::BadInterval(token.to_string());

        let unit_ch = token.chars().last().ok_or_else(|| bad())?;
        let digits = &token[..token.len() - unit_ch.len_utf8()];
        let count: u32 = digits.parse().map_err(|_| bad())?;
        if count == 0 {
            return Err(bad());
        }

        let unit = match unit_ch {
            's' => IntervalUnit::Seconds,
            'm' => IntervalUnit::Minutes,
            'h' => IntervalUnit::Hours,
            'd' => IntervalUnit::Days,
            'w' => IntervalUnit::Weeks,
            'M' => IntervalUnit::Months,
            _ => return Err(bad()),
        };

        Ok(Self {
            token: token.to_string(),
            count,
            unit,
        })
    }

    /// The token as the exchange expects it in query strings.
    pub fn wire(&self) -> &str {
        &self.token
    }

    /// The instant `k` intervals after `origin`.
    ///
    /// Month intervals are computed as a single multiple from the origin so
    /// that a sequence anchored at e.g. Jan 31 yields Feb 28 (29), Mar 31,
    /// Apr 30 rather than drifting to the shortest month seen so far.
    fn step_from(&self, origin: DateTime<Utc>, k: u32) -> DateTime<Utc> {
        match self.unit {
            IntervalUnit::Months => origin
                .checked_add_months(Months::new(self.count * k))
                .expect("timestamp out of chrono range"),
            _ => origin + Duration::seconds(self.unit_seconds() * i64::from(self.count) * i64::from(k)),
        }
    }

    /// The instant one interval after `ts`.
    pub fn advance(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        self.step_from(ts, 1)
    }

    /// Close time of the kline opening at `open`: one interval forward,
    /// minus one second (the series' time unit).
    pub fn close_time(&self, open: DateTime<Utc>) -> DateTime<Utc> {
        self.advance(open) - Duration::seconds(1)
    }

    /// Every boundary `start + k * interval <= end`, ascending.
    ///
    /// `start` itself is always the first boundary when `start <= end`;
    /// an inverted range yields an empty sequence.
    pub fn boundaries(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut out = Vec::new();
        let mut k: u32 = 0;
        loop {
            let t = self.step_from(start, k);
            if t > end {
                break;
            }
            out.push(t);
            k += 1;
        }
        out
    }

    fn unit_seconds(&self) -> i64 {
        match self.unit {
            IntervalUnit::Seconds => 1,
            IntervalUnit::Minutes => 60,
            IntervalUnit::Hours => 3_600,
            IntervalUnit::Days => 86_400,
            IntervalUnit::Weeks => 604_800,
            IntervalUnit::Months => unreachable!("months are calendar-stepped"),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
