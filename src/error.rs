//! Error types for the storage layer.

use thiserror::Error;

use crate::storage::ConnectionConfig;

/// Errors raised while initializing or querying the telemetry store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// One or more required connection variables are unset or empty.
    /// `partial` holds best-effort defaults for diagnostics only.
    #[error("required database environment variables not set: {}", missing.join(", "))]
    ConfigIncomplete {
        missing: Vec<&'static str>,
        partial: Box<ConnectionConfig>,
    },

    #[error("invalid database configuration: {0}")]
    InvalidConfig(String),

    #[error("unable to resolve backend hostname: {0}")]
    HostnameUnavailable(#[source] std::io::Error),

    #[error("unable to open a connection to the database server: {0}")]
    ConnectFailed(#[source] sqlx::Error),

    #[error("unable to ping the database server: {0}")]
    PingFailed(#[source] sqlx::Error),

    #[error("unable to probe for table {table}: {source}")]
    SchemaProbeFailed {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("unable to create table {table}: {source}")]
    SchemaCreateFailed {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{operation}: query failed: {source}")]
    QueryFailed {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{operation}: unable to scan row: {source}")]
    ScanFailed {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("expected at most one banned entry for {ip}, found {count}")]
    AmbiguousMatch { ip: String, count: usize },

    #[error("database is not initialized")]
    NotInitialized,
}

impl StoreError {
    /// Returns the variable names reported missing, if this is a config error.
    pub fn missing_variables(&self) -> &[&'static str] {
        match self {
            Self::ConfigIncomplete { missing, .. } => missing,
            _ => &[],
        }
    }

    /// True when the store could not be reached or was never set up, as
    /// opposed to a failure of an individual statement.
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ConfigIncomplete { .. }
                | Self::InvalidConfig(_)
                | Self::ConnectFailed(_)
                | Self::PingFailed(_)
                | Self::NotInitialized
        )
    }
}
