//! Database connection and lifecycle management

use std::time::Duration;

use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use tracing::{debug, error, info};

use super::config::ConnectionConfig;
use crate::error::StoreError;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pool tuning that does not come from the connection variables
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub ssl_mode: PgSslMode,
    pub max_connections: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            ssl_mode: PgSslMode::Prefer,
            max_connections: 10,
        }
    }
}

/// Shared handle to the telemetry store
#[derive(Clone)]
pub struct Database {
    pub(super) pool: PgPool,
    backend: String,
}

impl Database {
    /// Open a pool against the configured server and verify it with a ping.
    pub async fn connect(
        config: &ConnectionConfig,
        settings: &PoolSettings,
    ) -> Result<Self, StoreError> {
        let options = connect_options(config, settings.ssl_mode)?;
        let backend = backend_identity()?;

        info!(
            host = %config.host,
            port = %config.port,
            database = %config.database,
            ssl_mode = ?settings.ssl_mode,
            "Connecting to database server"
        );

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| {
                error!(
                    host = %config.host,
                    error = %e,
                    "Unable to open a connection to database server"
                );
                StoreError::ConnectFailed(e)
            })?;

        let db = Self { pool, backend };
        db.ping().await?;

        info!(
            host = %config.host,
            database = %config.database,
            backend = %db.backend,
            "Database connection established"
        );

        Ok(db)
    }

    /// Liveness probe over an acquired pool connection
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            error!(error = %e, "Unable to ping database");
            StoreError::PingFailed(e)
        })?;
        conn.ping().await.map_err(|e| {
            error!(error = %e, "Unable to ping database");
            StoreError::PingFailed(e)
        })?;
        debug!("Database ping succeeded");
        Ok(())
    }

    /// Host identity recorded on every stored event
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connections closed");
    }
}

/// Build connect options from a complete configuration.
///
/// Incomplete configs are rejected here so no connection attempt is made
/// with diagnostic defaults.
pub(super) fn connect_options(
    config: &ConnectionConfig,
    ssl_mode: PgSslMode,
) -> Result<PgConnectOptions, StoreError> {
    let missing = config.missing_fields();
    if !missing.is_empty() {
        return Err(StoreError::ConfigIncomplete {
            missing,
            partial: Box::new(config.clone()),
        });
    }

    let mut options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port_number()?)
        .username(&config.user)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(ssl_mode);

    if let Some(schema) = &config.schema {
        options = options.options([("search_path", schema.as_str())]);
    }

    Ok(options)
}

fn backend_identity() -> Result<String, StoreError> {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .map_err(|e| {
            error!(error = %e, "Unable to get hostname");
            StoreError::HostnameUnavailable(e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> ConnectionConfig {
        ConnectionConfig {
            host: "db.internal".to_string(),
            port: "5433".to_string(),
            user: "collector".to_string(),
            password: "secret".to_string(),
            database: "telemetry".to_string(),
            schema: None,
        }
    }

    #[test]
    fn test_connect_options_from_complete_config() {
        let options = connect_options(&complete(), PgSslMode::Disable).unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_username(), "collector");
        assert_eq!(options.get_database(), Some("telemetry"));
        assert!(matches!(options.get_ssl_mode(), PgSslMode::Disable));
    }

    #[test]
    fn test_connect_options_with_schema() {
        let mut config = complete();
        config.schema = Some("edge_tests".to_string());
        let options = connect_options(&config, PgSslMode::Prefer).unwrap();
        assert!(
            options
                .get_options()
                .is_some_and(|o| o.contains("search_path=edge_tests"))
        );
    }

    #[test]
    fn test_connect_options_rejects_incomplete_config() {
        let mut config = complete();
        config.password.clear();
        config.database.clear();

        match connect_options(&config, PgSslMode::Prefer) {
            Err(StoreError::ConfigIncomplete { missing, .. }) => {
                assert_eq!(missing, vec!["DBPASS", "DBNAME"]);
            }
            other => panic!("expected ConfigIncomplete, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_connect_options_rejects_bad_port() {
        let mut config = complete();
        config.port = "54x".to_string();
        assert!(matches!(
            connect_options(&config, PgSslMode::Prefer),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_refuses_incomplete_config_without_network() {
        let config = ConnectionConfig {
            host: "localhost".to_string(),
            ..Default::default()
        };
        let result = Database::connect(&config, &PoolSettings::default()).await;
        assert!(matches!(result, Err(StoreError::ConfigIncomplete { .. })));
    }

    #[test]
    fn test_backend_identity_is_not_empty() {
        assert!(!backend_identity().unwrap().is_empty());
    }
}
