pub mod client;
pub mod rate_limit;

// Re-export for convenient access (e.g. `use crate::binance::BinanceClient`).
pub use client::BinanceClient;
pub use rate_limit::{RateLimitTracker, RatePolicy};
