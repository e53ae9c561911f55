// =============================================================================
// Typed errors for the kline retrieval pipeline
// =============================================================================

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Domain errors that callers are expected to branch on.
///
/// Transport-level failures keep flowing through `anyhow` with context at the
/// call sites; only conditions with a defined caller-visible meaning get a
/// variant here.
#[derive(Debug, Error)]
pub enum KlineError {
    /// The requested end instant precedes the start instant.  Raised before
    /// any request is issued; there is never partial output.
    #[error("invalid time range: end {end} precedes start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// The interval token could not be parsed (e.g. `"15x"`, `""`).
    /// Membership in the exchange's supported set is not checked.
    #[error("unparseable interval token: {0:?}")]
    BadInterval(String),
}
