//! PostgreSQL persistence module.
//!
//! Provides connection pooling and schema migrations for the PostgreSQL backend.

pub mod pool;

pub use pool::PostgresPool;
