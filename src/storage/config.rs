//! Connection parameter resolution
//!
//! The five connection parameters are read from the process environment,
//! optionally pre-populated from a dotenv file. Resolution never stops at
//! the first missing variable: every gap is reported at once.

use std::fmt;
use std::path::Path;

use tracing::{debug, error, warn};

use crate::error::StoreError;

/// Environment variable names for the database connection
pub mod env {
    pub const DB_HOST: &str = "DBHOST";
    pub const DB_PORT: &str = "DBPORT";
    pub const DB_USER: &str = "DBUSER";
    pub const DB_PASS: &str = "DBPASS";
    pub const DB_NAME: &str = "DBNAME";
    /// Optional: pins the connection's search_path
    pub const DB_SCHEMA: &str = "DBSCHEMA";
}

/// Host used in the diagnostic config when `DBHOST` is unset
pub const DEFAULT_HOST: &str = "localhost";

/// Connection parameters for the relational store
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub schema: Option<String>,
}

impl ConnectionConfig {
    /// Resolve the configuration from the process environment.
    pub fn resolve() -> Result<Self, StoreError> {
        Self::resolve_from(|name| std::env::var(name).ok())
    }

    /// Resolve the configuration through an arbitrary variable lookup.
    pub fn resolve_from<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut read = |name: &'static str| match lookup(name).filter(|v| !v.is_empty()) {
            Some(value) => Some(value),
            None => {
                error!(
                    variable = name,
                    "Database environment variable empty or non-existent"
                );
                missing.push(name);
                None
            }
        };

        let host = read(env::DB_HOST);
        let port = read(env::DB_PORT);
        let user = read(env::DB_USER);
        let password = read(env::DB_PASS);
        let database = read(env::DB_NAME);
        let schema = lookup(env::DB_SCHEMA).filter(|v| !v.is_empty());

        let config = Self {
            host: host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: port.unwrap_or_default(),
            user: user.unwrap_or_default(),
            password: password.unwrap_or_default(),
            database: database.unwrap_or_default(),
            schema,
        };

        if missing.is_empty() {
            debug!(
                host = %config.host,
                port = %config.port,
                database = %config.database,
                "Database configuration resolved"
            );
            Ok(config)
        } else {
            Err(StoreError::ConfigIncomplete {
                missing,
                partial: Box::new(config),
            })
        }
    }

    /// True when every required field is populated
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the required variables whose field is empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            (env::DB_HOST, &self.host),
            (env::DB_PORT, &self.port),
            (env::DB_USER, &self.user),
            (env::DB_PASS, &self.password),
            (env::DB_NAME, &self.database),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Parsed port number
    pub fn port_number(&self) -> Result<u16, StoreError> {
        self.port.parse().map_err(|_| {
            StoreError::InvalidConfig(format!(
                "{} is not a valid port: {:?}",
                env::DB_PORT,
                self.port
            ))
        })
    }

    /// True when the host refers to this machine
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Best-effort load of a dotenv file into the process environment.
///
/// Variables already set in the environment take precedence.
pub fn load_env_file(path: &Path) -> bool {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Loaded environment file");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Error loading environment file");
            false
        }
    }
}
