use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use sqlx::postgres::PgSslMode;

use crate::storage::{LivenessProbe, PoolSettings, StoreSettings};

// Service settings. The database connection variables (DBHOST, DBPORT, ...)
// are resolved separately by the storage layer.
pub mod env {
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const SERVER_PORT: &str = "SERVER_PORT";
    pub const HEALTH_PORT: &str = "HEALTH_PORT";
    pub const ENV_FILE: &str = "ENV_FILE";
    pub const DB_SSL_MODE: &str = "DB_SSL_MODE";
    pub const DB_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
    pub const DB_PROCESS_NAME: &str = "DB_PROCESS_NAME";
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show version information
    Version,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "zehd-backend",
    version,
    about = "Backend collector for reverse-proxy request telemetry",
    long_about = "Receives per-request telemetry from reverse-proxy frontends, stores it in \
                  PostgreSQL and answers banned-entity look-ups."
)]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Log format: json or pretty
    #[arg(long, env = env::LOG_FORMAT, default_value = "json")]
    pub log_format: String,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = env::LOG_LEVEL, default_value = "info")]
    pub log_level: String,

    /// API server port
    #[arg(long, env = env::SERVER_PORT, default_value = "8080")]
    pub server_port: u16,

    /// Health check server port
    #[arg(long, env = env::HEALTH_PORT, default_value = "8081")]
    pub health_port: u16,

    /// Supplementary environment file with database variables
    #[arg(long, env = env::ENV_FILE, default_value = "/usr/local/env/.env")]
    pub env_file: PathBuf,

    /// PostgreSQL TLS mode: disable, allow, prefer, require, verify-ca, verify-full
    #[arg(long, env = env::DB_SSL_MODE, default_value = "prefer")]
    pub db_ssl_mode: String,

    /// Maximum pooled database connections
    #[arg(long, env = env::DB_MAX_CONNECTIONS, default_value = "10")]
    pub db_max_connections: u32,

    /// Database server executable looked up for local liveness checks
    #[arg(long, env = env::DB_PROCESS_NAME, default_value = "postgres")]
    pub db_process_name: String,
}

impl Config {
    pub fn from_args() -> Self {
        Config::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.ssl_mode()?;
        if self.db_max_connections == 0 {
            return Err(format!("{} must be greater than 0", env::DB_MAX_CONNECTIONS));
        }
        if self.server_port == self.health_port {
            return Err(format!(
                "{} and {} must differ",
                env::SERVER_PORT,
                env::HEALTH_PORT
            ));
        }
        Ok(())
    }

    pub fn ssl_mode(&self) -> Result<PgSslMode, String> {
        PgSslMode::from_str(&self.db_ssl_mode)
            .map_err(|_| format!("unknown {}: {}", env::DB_SSL_MODE, self.db_ssl_mode))
    }

    /// Storage settings derived from the CLI/environment
    pub fn store_settings(&self) -> Result<StoreSettings, String> {
        let ssl_mode = self.ssl_mode()?;
        Ok(StoreSettings {
            env_file: Some(self.env_file.clone()),
            pool: PoolSettings {
                ssl_mode,
                max_connections: self.db_max_connections,
            },
            liveness: LivenessProbe {
                process_name: self.db_process_name.clone(),
                ssl_mode,
            },
        })
    }
}
