//! Storage layer for the telemetry collector
//!
//! This module provides PostgreSQL persistence for collected request events
//! and banned-entity look-ups.
//!
//! # Module Structure
//! - `config`: Connection parameter resolution from the environment
//! - `database`: Connection pool and lifecycle of a single handle
//! - `schema`: Idempotent schema bootstrap
//! - `operations`: Insert and query operations
//! - `liveness`: Process-table and remote liveness diagnostics
//! - `store`: Shared handle ownership, initialization and teardown
//! - `models`: Data types and structures

mod config;
mod database;
mod liveness;
mod models;
mod operations;
mod schema;
mod store;

// Re-export public types
pub use config::{ConnectionConfig, DEFAULT_HOST, env, load_env_file};
pub use database::{Database, PoolSettings};
pub use liveness::{DEFAULT_PROCESS_NAME, LivenessProbe, check_store_alive};
pub use models::{BannedEntity, CollectedEvent, LivenessStatus, SchemaStatus};
pub use schema::{
    BANNED_ENTITIES, CHECKED_ENTITIES, COLLECTED_EVENTS, TABLES, TableDef, ensure_schema,
};
pub use store::{LivenessReport, Store, StoreSettings};
