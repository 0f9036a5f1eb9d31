//! Lifecycle owner for the shared database handle
//!
//! `initialize` is serialized: concurrent callers queue on the init lock.
//! The handle is only replaced when it can no longer reach the server, and
//! a replaced handle is never closed under its readers.

use std::path::PathBuf;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use super::config::{ConnectionConfig, load_env_file};
use super::database::{Database, PoolSettings};
use super::liveness::LivenessProbe;
use super::models::{LivenessStatus, SchemaStatus};
use super::schema::ensure_schema;
use crate::error::StoreError;

/// Settings for [`Store`]
#[derive(Debug, Clone, Default)]
pub struct StoreSettings {
    /// Supplementary dotenv file loaded before resolving the connection variables
    pub env_file: Option<PathBuf>,
    pub pool: PoolSettings,
    pub liveness: LivenessProbe,
}

/// Result of a liveness check that may have bootstrapped the schema
#[derive(Debug)]
pub struct LivenessReport {
    pub status: LivenessStatus,
    /// Present only when the check fell back to initialization
    pub bootstrap: Option<Result<SchemaStatus, StoreError>>,
}

impl LivenessReport {
    /// True when the store is usable after the check
    pub fn is_alive(&self) -> bool {
        match &self.bootstrap {
            Some(outcome) => outcome.is_ok(),
            None => self.status == LivenessStatus::Found,
        }
    }
}

pub struct Store {
    settings: StoreSettings,
    init_lock: Mutex<()>,
    current: RwLock<Option<Database>>,
}

impl Store {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            settings,
            init_lock: Mutex::new(()),
            current: RwLock::new(None),
        }
    }

    /// Resolve the configuration, connect and bootstrap the schema.
    ///
    /// A reachable existing handle is kept and only re-bootstrapped. An
    /// unreachable one is dropped from the store before reconnecting; clones
    /// already handed out keep the old pool until they are dropped.
    pub async fn initialize(&self) -> Result<SchemaStatus, StoreError> {
        let _guard = self.init_lock.lock().await;
        info!("Initializing database");

        let existing = self.current.read().await.clone();
        if let Some(db) = existing {
            match db.ping().await {
                Ok(()) => {
                    let status = ensure_schema(&db).await?;
                    info!(schema = %status, "Database initialized on the existing handle");
                    return Ok(status);
                }
                Err(e) => {
                    warn!(error = %e, "Existing database handle unreachable, reconnecting");
                    self.current.write().await.take();
                }
            }
        }

        let config = self.resolve_config()?;
        let db = Database::connect(&config, &self.settings.pool).await?;
        let status = match ensure_schema(&db).await {
            Ok(status) => status,
            Err(e) => {
                db.close().await;
                return Err(e);
            }
        };

        *self.current.write().await = Some(db);

        info!(schema = %status, "Database initialized");
        Ok(status)
    }

    /// Current handle, or `NotInitialized` while running degraded
    pub async fn database(&self) -> Result<Database, StoreError> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(StoreError::NotInitialized)
    }

    pub async fn is_initialized(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Liveness check that falls back to full initialization when a remote
    /// store cannot be queried.
    pub async fn check_and_heal(&self) -> LivenessReport {
        let Some(config) = self.diagnostic_config() else {
            return LivenessReport {
                status: LivenessStatus::QueryFailed,
                bootstrap: None,
            };
        };

        let status = self.settings.liveness.check(&config).await;
        if status != LivenessStatus::QueryFailed || config.is_local() {
            return LivenessReport {
                status,
                bootstrap: None,
            };
        }

        info!(host = %config.host, "Liveness probe failed, attempting database initialization");
        let outcome = self.initialize().await;
        if let Err(e) = &outcome {
            error!(error = %e, "Database initialization error after liveness check");
        }

        LivenessReport {
            status,
            bootstrap: Some(outcome),
        }
    }

    /// Release the shared handle
    pub async fn close(&self) {
        let _guard = self.init_lock.lock().await;
        if let Some(db) = self.current.write().await.take() {
            db.close().await;
        }
    }

    fn resolve_config(&self) -> Result<ConnectionConfig, StoreError> {
        if let Some(path) = &self.settings.env_file {
            load_env_file(path);
        }
        ConnectionConfig::resolve()
    }

    // An incomplete configuration still carries its diagnostic host, so a
    // local process scan works without full configuration.
    fn diagnostic_config(&self) -> Option<ConnectionConfig> {
        match self.resolve_config() {
            Ok(config) => Some(config),
            Err(StoreError::ConfigIncomplete { partial, .. }) => Some(*partial),
            Err(e) => {
                warn!(error = %e, "Unable to resolve database configuration");
                None
            }
        }
    }
}
