// =============================================================================
// Rate-Limit Tracker — paces the bulk fetch to avoid 429s
// =============================================================================
//
// Binance budgets request weight at 1200 per minute and reports the spent
// amount in the `X-MBX-USED-WEIGHT-1M` response header.  The fetch loop runs
// strictly sequentially, so the tracker is a plain single-owner counter pair,
// consulted after every request:
//
//   - fixed policy: pause after every N requests (default 1000), matching
//     the unconditional pause of the original bulk puller;
//   - adaptive policy: additionally pause when the reported weight crosses
//     a soft limit, so explicit server feedback wins over the fixed count.
//
// Both behaviors are configuration, not hard-coded.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

fn default_pause_after_requests() -> u32 {
    1000
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_adaptive() -> bool {
    true
}

fn default_weight_soft_limit() -> u32 {
    800
}

/// When and for how long the fetch loop pauses.
///
/// Every field has a serde default so older config files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatePolicy {
    /// Pause unconditionally after this many requests.
    #[serde(default = "default_pause_after_requests")]
    pub pause_after_requests: u32,

    /// Length of one cooldown pause, in seconds.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Also pause when the server-reported used weight crosses
    /// `weight_soft_limit`.
    #[serde(default = "default_adaptive")]
    pub adaptive: bool,

    /// Soft ceiling on `X-MBX-USED-WEIGHT-1M` (hard budget is 1200/min).
    #[serde(default = "default_weight_soft_limit")]
    pub weight_soft_limit: u32,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            pause_after_requests: default_pause_after_requests(),
            cooldown_secs: default_cooldown_secs(),
            adaptive: default_adaptive(),
            weight_soft_limit: default_weight_soft_limit(),
        }
    }
}

/// Single-owner request pacing state.  The fetch loop records every request
/// and asks for a cooldown before issuing the next one.
#[derive(Debug, Default)]
pub struct RateLimitTracker {
    requests_total: u32,
    requests_since_pause: u32,
    used_weight_1m: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one issued request and, when present, the used-weight value
    /// from the response headers.
    pub fn record_request(&mut self, used_weight: Option<u32>, policy: &RatePolicy) {
        self.requests_total += 1;
        self.requests_since_pause += 1;

        if let Some(w) = used_weight {
            let prev = std::mem::replace(&mut self.used_weight_1m, w);
            if w >= policy.weight_soft_limit && prev < policy.weight_soft_limit {
                warn!(
                    used_weight = w,
                    soft_limit = policy.weight_soft_limit,
                    "rate-limit weight crossed soft limit"
                );
            }
            debug!(used_weight_1m = w, "rate-limit weight updated from header");
        }
    }

    /// Cooldown mandated by `policy` at the current state, if any.
    pub fn cooldown(&self, policy: &RatePolicy) -> Option<Duration> {
        if self.requests_since_pause >= policy.pause_after_requests {
            return Some(Duration::from_secs(policy.cooldown_secs));
        }
        if policy.adaptive && self.used_weight_1m >= policy.weight_soft_limit {
            return Some(Duration::from_secs(policy.cooldown_secs));
        }
        None
    }

    /// Mark a completed pause; the fixed counter restarts and the stale
    /// weight reading is discarded (the server window has rolled over).
    pub fn note_pause(&mut self) {
        self.requests_since_pause = 0;
        self.used_weight_1m = 0;
    }

    /// Requests issued over the whole run, pauses included.
    pub fn requests_total(&self) -> u32 {
        self.requests_total
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_threshold_mandates_pause() {
        let policy = RatePolicy {
            pause_after_requests: 3,
            cooldown_secs: 60,
            adaptive: false,
            weight_soft_limit: 800,
        };
        let mut tracker = RateLimitTracker::new();

        tracker.record_request(None, &policy);
        tracker.record_request(None, &policy);
        assert!(tracker.cooldown(&policy).is_none());

        tracker.record_request(None, &policy);
        assert_eq!(tracker.cooldown(&policy), Some(Duration::from_secs(60)));

        tracker.note_pause();
        assert!(tracker.cooldown(&policy).is_none());
        assert_eq!(tracker.requests_total(), 3);
    }

    #[test]
    fn adaptive_reacts_to_reported_weight() {
        let policy = RatePolicy::default();
        let mut tracker = RateLimitTracker::new();

        tracker.record_request(Some(799), &policy);
        assert!(tracker.cooldown(&policy).is_none());

        tracker.record_request(Some(801), &policy);
        assert_eq!(
            tracker.cooldown(&policy),
            Some(Duration::from_secs(policy.cooldown_secs))
        );
    }

    #[test]
    fn adaptive_off_ignores_weight() {
        let policy = RatePolicy {
            adaptive: false,
            ..RatePolicy::default()
        };
        let mut tracker = RateLimitTracker::new();
        tracker.record_request(Some(1200), &policy);
        assert!(tracker.cooldown(&policy).is_none());
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: RatePolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.pause_after_requests, 1000);
        assert_eq!(policy.cooldown_secs, 60);
        assert!(policy.adaptive);
        assert_eq!(policy.weight_soft_limit, 800);
    }
}
