//! Storage backends shared by the conversation and notification modules.
//!
//! Each store is a trait with an in-memory (`DashMap`) and a PostgreSQL
//! implementation. Use [`create_backends`] to build the set selected by
//! `storage.backend`.

mod error;
mod factory;

pub use error::StoreError;
pub use factory::{create_backends, Backends};
