//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `auth`: JWT validation and the caller extractor
//! - `config`: Application configuration and settings
//! - `error`: Unified error types
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL connection pool and migrations
//! - `redis`: reconnection backoff for the cluster relay

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod redis;
