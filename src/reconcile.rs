// =============================================================================
// Gap Reconciler — make the fetched series dense and chronological
// =============================================================================
//
// The klines endpoint silently omits intervals in which no trades happened,
// so the raw concatenation of window responses can have holes (and, across
// window edges, duplicates; order is not guaranteed either).  Reconciliation
// rebuilds the full boundary grid between the observed minimum and maximum
// open times and synthesizes a placeholder for every boundary the exchange
// skipped.  A placeholder is a real event ("no trading activity in this
// interval"), not missing data, and must survive into the output.
//
// Post-condition: exactly one record per boundary of the grid, ascending by
// open time.
// =============================================================================

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::candle::Candle;
use crate::interval::Interval;

/// Summary of a single reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Boundaries in the full grid between min and max observed open time.
    pub expected: usize,
    /// Distinct open times present in the raw table.
    pub observed: usize,
    /// Placeholder records synthesized for omitted intervals.
    pub synthesized: usize,
    /// Raw rows dropped because their open time was already present.
    pub duplicates_dropped: usize,
}

/// Reconcile a raw fetched table into a dense, sorted series.
///
/// The grid is generated with the same interval stepping the partitioner
/// uses, anchored at the earliest observed open time.  An empty input stays
/// empty; a complete input comes back unchanged apart from ordering.
pub fn reconcile(raw: Vec<Candle>, interval: &Interval) -> (Vec<Candle>, ReconcileReport) {
    if raw.is_empty() {
        return (
            Vec::new(),
            ReconcileReport {
                expected: 0,
                observed: 0,
                synthesized: 0,
                duplicates_dropped: 0,
            },
        );
    }

    // min/max are total on the non-empty input; open times are second
    // resolution already.
    let first = raw.iter().map(|c| c.open_time).min().unwrap();
    let last = raw.iter().map(|c| c.open_time).max().unwrap();

    let expected = interval.boundaries(first, last);

    let observed: HashSet<DateTime<Utc>> = raw.iter().map(|c| c.open_time).collect();

    // `expected` ascends, so the missing set inherits its order.
    let missing: Vec<DateTime<Utc>> = expected
        .iter()
        .copied()
        .filter(|t| !observed.contains(t))
        .collect();

    for t in &missing {
        debug!(open_time = %t, "synthesizing placeholder for omitted interval");
    }

    let mut merged = raw;
    let synthesized = missing.len();
    merged.extend(missing.into_iter().map(|t| Candle::placeholder(t, interval)));

    // Stable sort: among duplicate open times the earliest-fetched row wins.
    merged.sort_by_key(|c| c.open_time);
    let before = merged.len();
    merged.dedup_by_key(|c| c.open_time);
    let duplicates_dropped = before - merged.len();

    let report = ReconcileReport {
        expected: expected.len(),
        observed: observed.len(),
        synthesized,
        duplicates_dropped,
    };

    info!(
        expected = report.expected,
        observed = report.observed,
        synthesized = report.synthesized,
        duplicates_dropped = report.duplicates_dropped,
        "reconciliation complete"
    );

    (merged, report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
