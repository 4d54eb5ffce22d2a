// Infrastructure layer (shared components)
pub mod infrastructure;

// Re-export infrastructure modules at the crate root
pub use infrastructure::auth;
pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::postgres;
pub use infrastructure::redis;

// Domain layer (business logic)
pub mod cluster;
pub mod connection_manager;
pub mod conversation;
pub mod directory;
pub mod notification;
pub mod storage;

// Application layer
pub mod api;
pub mod server;
pub mod websocket;

// Supporting modules
pub mod tasks;
pub mod telemetry;
