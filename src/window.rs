// =============================================================================
// Window Partitioner — split a date range into page-sized request windows
// =============================================================================
//
// The klines endpoint caps each response at `page_size` rows, so an arbitrary
// range has to be cut into consecutive windows of at most that many interval
// boundaries.  Windows are inclusive on both ends; the window sequence covers
// the boundary sequence exactly, with no gap and no duplicated boundary.
// =============================================================================

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::KlineError;
use crate::interval::Interval;

/// One bounded request's time span, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Partition `[start, end]` into chronologically ordered windows of at most
/// `page_size` interval boundaries each.  The final window may be shorter.
///
/// A range holding zero or one boundary collapses to a single degenerate
/// window with `start == end`.  An inverted range fails with
/// [`KlineError::InvalidRange`] before anything is produced.
pub fn partition(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: &Interval,
    page_size: usize,
) -> Result<Vec<Window>, KlineError> {
    if end < start {
        return Err(KlineError::InvalidRange { start, end });
    }
    let page_size = page_size.max(1);

    let bounds = interval.boundaries(start, end);
    if bounds.len() <= 1 {
        let at = bounds.first().copied().unwrap_or(start);
        return Ok(vec![Window { start: at, end: at }]);
    }

    let windows: Vec<Window> = bounds
        .chunks(page_size)
        .map(|chunk| Window {
            start: chunk[0],
            // chunks() never yields an empty slice
            end: *chunk.last().unwrap(),
        })
        .collect();

    debug!(
        boundaries = bounds.len(),
        windows = windows.len(),
        page_size,
        "range partitioned"
    );

    Ok(windows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
