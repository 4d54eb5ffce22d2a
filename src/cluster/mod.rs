//! Cluster module for distributed deployment support
//!
//! Room events are delivered to local sessions and, when `cluster.enabled`
//! is set, published on a Redis channel so every other instance can deliver
//! them to the sessions it holds.

mod relay;
mod router;

pub use relay::{ClusterRelay, RelayError, RelaySubscriber, RoutedEvent};
pub use router::{ClusterRouter, RouteResult};
