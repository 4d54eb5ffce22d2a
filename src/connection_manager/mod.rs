//! Realtime room registry for live WebSocket sessions.

mod registry;
mod stats;
mod types;

pub use registry::ConnectionManager;
pub use stats::{EmitResult, RegistryStats};
pub use types::SessionHandle;
