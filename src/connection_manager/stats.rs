//! Registry statistics and emit results

use serde::Serialize;

/// Registry statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_sessions: usize,
    pub authenticated_sessions: usize,
    pub rooms: usize,
}

/// Outcome of emitting one message to a room
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmitResult {
    /// Sessions whose buffer accepted the message
    pub delivered: usize,
    /// Sessions whose buffer was full or closed
    pub dropped: usize,
}

impl EmitResult {
    pub fn is_empty(&self) -> bool {
        self.delivered == 0 && self.dropped == 0
    }
}
