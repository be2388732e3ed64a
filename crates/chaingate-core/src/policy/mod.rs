//! Retry policy for connection establishment.
//!
//! Per-request reads and writes are never retried; only dialing a node goes
//! through this policy.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
