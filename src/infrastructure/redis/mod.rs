//! Redis helpers for the cluster relay.
//!
//! - `ExponentialBackoff`: reconnection delays for the pub/sub subscriber

mod backoff;

pub use backoff::{BackoffConfig, ExponentialBackoff};
