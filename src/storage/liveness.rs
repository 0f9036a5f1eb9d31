//! Store liveness diagnostics
//!
//! For a local store the process table is inspected instead of opening a
//! connection. For a remote store a short-lived standalone connection probes
//! the primary table; the shared pool is never used here.

use std::time::Duration;

use sqlx::Connection;
use sqlx::postgres::{PgConnection, PgSslMode};
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use super::config::ConnectionConfig;
use super::database::connect_options;
use super::models::LivenessStatus;
use super::schema::COLLECTED_EVENTS;

const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Executable name of the PostgreSQL server
pub const DEFAULT_PROCESS_NAME: &str = "postgres";

#[derive(Debug, Clone)]
pub struct LivenessProbe {
    pub process_name: String,
    pub ssl_mode: PgSslMode,
}

impl Default for LivenessProbe {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            ssl_mode: PgSslMode::Prefer,
        }
    }
}

/// Liveness check for `config` with the default TLS mode.
pub async fn check_store_alive(config: &ConnectionConfig, process_name: &str) -> LivenessStatus {
    let probe = LivenessProbe {
        process_name: process_name.to_string(),
        ..Default::default()
    };
    probe.check(config).await
}

impl LivenessProbe {
    /// Check whether the store is alive. Never reports `Found` for an
    /// unreachable remote store.
    pub async fn check(&self, config: &ConnectionConfig) -> LivenessStatus {
        if config.is_local() {
            self.scan_process_table().await
        } else {
            self.probe_remote(config).await
        }
    }

    async fn scan_process_table(&self) -> LivenessStatus {
        let name = self.process_name.clone();
        let scan = tokio::task::spawn_blocking(move || {
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::All, true);
            let processes = system
                .processes()
                .values()
                .map(|p| (p.pid().as_u32(), p.name().to_string_lossy().into_owned()));
            find_process(processes, &name)
        })
        .await;

        match scan {
            Ok(Some(pid)) => {
                info!(process = %self.process_name, pid = pid, "Database server process found");
                LivenessStatus::Found
            }
            Ok(None) => {
                info!(
                    process = %self.process_name,
                    "Database server process not found, please make sure it is installed"
                );
                LivenessStatus::NotFound
            }
            Err(e) => {
                warn!(error = %e, "Unable to list processes");
                LivenessStatus::QueryFailed
            }
        }
    }

    async fn probe_remote(&self, config: &ConnectionConfig) -> LivenessStatus {
        let options = match connect_options(config, self.ssl_mode) {
            Ok(options) => options,
            Err(e) => {
                warn!(error = %e, "Unable to configure liveness probe");
                return LivenessStatus::QueryFailed;
            }
        };

        let connect = PgConnection::connect_with(&options);
        let mut conn = match tokio::time::timeout(PROBE_CONNECT_TIMEOUT, connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!(
                    host = %config.host,
                    error = %e,
                    "Unable to open a connection to database server"
                );
                return LivenessStatus::QueryFailed;
            }
            Err(_) => {
                warn!(
                    host = %config.host,
                    timeout_secs = PROBE_CONNECT_TIMEOUT.as_secs(),
                    "Timed out connecting to database server"
                );
                return LivenessStatus::QueryFailed;
            }
        };

        let probe = format!("SELECT 1 FROM {COLLECTED_EVENTS} LIMIT 1");
        let result = sqlx::query(&probe).fetch_optional(&mut conn).await;

        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error closing liveness probe connection");
        }

        match result {
            Ok(_) => {
                debug!(host = %config.host, table = COLLECTED_EVENTS, "Database found");
                LivenessStatus::Found
            }
            Err(e) => {
                warn!(
                    host = %config.host,
                    table = COLLECTED_EVENTS,
                    error = %e,
                    "Unable to query database, please check your database server"
                );
                LivenessStatus::QueryFailed
            }
        }
    }
}

/// First pid whose executable name matches, ignoring a `.exe` suffix
pub(crate) fn find_process<I, S>(processes: I, name: &str) -> Option<u32>
where
    I: IntoIterator<Item = (u32, S)>,
    S: AsRef<str>,
{
    processes.into_iter().find_map(|(pid, executable)| {
        let executable = executable.as_ref();
        let executable = executable.strip_suffix(".exe").unwrap_or(executable);
        (executable == name).then_some(pid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(host: &str) -> ConnectionConfig {
        ConnectionConfig {
            host: host.to_string(),
            port: "1".to_string(),
            user: "collector".to_string(),
            password: "secret".to_string(),
            database: "telemetry".to_string(),
            schema: None,
        }
    }

    #[test]
    fn test_find_process_match() {
        let processes = vec![(1, "systemd"), (412, "postgres"), (413, "postgres")];
        assert_eq!(find_process(processes, "postgres"), Some(412));
    }

    #[test]
    fn test_find_process_no_match() {
        let processes = vec![(1, "systemd"), (77, "postgres-exporter")];
        assert_eq!(find_process(processes, "postgres"), None);
    }

    #[test]
    fn test_find_process_windows_suffix() {
        let processes = vec![(9, "postgres.exe".to_string())];
        assert_eq!(find_process(processes, "postgres"), Some(9));
    }

    #[tokio::test]
    async fn test_local_check_missing_process() {
        let config = ConnectionConfig {
            host: "localhost".to_string(),
            ..Default::default()
        };
        let status = check_store_alive(&config, "zehd-no-such-server").await;
        assert_eq!(status, LivenessStatus::NotFound);
    }

    #[tokio::test]
    async fn test_remote_check_unreachable_is_query_failed() {
        let probe = LivenessProbe {
            ssl_mode: PgSslMode::Disable,
            ..Default::default()
        };
        // loopback alias outside the local host list, nothing listens on port 1
        let status = probe.check(&remote("127.0.0.2")).await;
        assert_eq!(status, LivenessStatus::QueryFailed);
    }

    #[tokio::test]
    async fn test_remote_check_incomplete_config_is_query_failed() {
        let mut config = remote("db.internal");
        config.user.clear();
        let status = LivenessProbe::default().check(&config).await;
        assert_eq!(status, LivenessStatus::QueryFailed);
    }
}
