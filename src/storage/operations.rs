//! Insert and query operations against the bootstrapped schema

use sqlx::Row;
use sqlx::postgres::PgRow;
use tracing::{debug, error};

use super::database::Database;
use super::models::{BannedEntity, CollectedEvent};
use crate::error::StoreError;

const INSERT_COLLECTED_EVENT: &str = r#"
    INSERT INTO collected_events (
        frontend, backend, ip, port, path, method, xforwardfor, xrealip,
        useragent, via, age, timedate, checked, banned, cfipcountry
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
"#;

const SELECT_BANNED_BY_IP: &str = r#"
    SELECT ip, domainname, timechecked, timebanned
    FROM banned_entities
    WHERE ip = $1
"#;

// Unbounded: callers get the whole table
const SELECT_ALL_COLLECTED: &str = r#"
    SELECT frontend, backend, ip, port, path, method, xforwardfor, xrealip,
           useragent, via, age, timedate, checked, banned, cfipcountry
    FROM collected_events
    ORDER BY unique_id
"#;

impl Database {
    /// Append one collected event; the backend column is this host.
    pub async fn insert_collected_event(&self, event: &CollectedEvent) -> Result<(), StoreError> {
        const OPERATION: &str = "insert_collected_event";

        sqlx::query(INSERT_COLLECTED_EVENT)
            .bind(&event.frontend_name)
            .bind(self.backend())
            .bind(&event.ip)
            .bind(event.port)
            .bind(&event.path)
            .bind(&event.method)
            .bind(&event.x_forward_for)
            .bind(&event.x_real_ip)
            .bind(&event.user_agent)
            .bind(&event.via)
            .bind(&event.age)
            .bind(event.time_date)
            .bind(event.checked)
            .bind(event.banned)
            .bind(&event.cf_ip_country)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!(
                    operation = OPERATION,
                    frontend = %event.frontend_name,
                    error = %e,
                    "Unable to insert data into database"
                );
                StoreError::QueryFailed {
                    operation: OPERATION,
                    source: e,
                }
            })?;

        debug!(
            frontend = %event.frontend_name,
            ip = %event.ip,
            path = %event.path,
            method = %event.method,
            "Collected event stored"
        );

        Ok(())
    }

    /// Look up the banned entry for an address.
    ///
    /// No row yields the zero value; more than one row is an error.
    pub async fn lookup_banned_entity(&self, ip: &str) -> Result<BannedEntity, StoreError> {
        const OPERATION: &str = "lookup_banned_entity";

        let rows = sqlx::query(SELECT_BANNED_BY_IP)
            .bind(ip)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed(OPERATION, e))?;

        match rows.as_slice() {
            [] => {
                debug!(ip = %ip, "No banned entry found");
                Ok(BannedEntity::default())
            }
            [row] => {
                let entity = banned_from_row(row).map_err(|e| scan_failed(OPERATION, e))?;
                debug!(ip = %ip, domain = %entity.domain_name, "Banned entry found");
                Ok(entity)
            }
            _ => {
                error!(ip = %ip, count = rows.len(), "Multiple banned entries for address");
                Err(StoreError::AmbiguousMatch {
                    ip: ip.to_string(),
                    count: rows.len(),
                })
            }
        }
    }

    /// Every collected event in insertion order
    pub async fn fetch_all_collected_events(&self) -> Result<Vec<CollectedEvent>, StoreError> {
        const OPERATION: &str = "fetch_all_collected_events";

        let rows = sqlx::query(SELECT_ALL_COLLECTED)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_failed(OPERATION, e))?;

        let events = rows
            .iter()
            .map(collected_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| scan_failed(OPERATION, e))?;

        debug!(count = events.len(), "Fetched collected events");
        Ok(events)
    }
}

fn query_failed(operation: &'static str, e: sqlx::Error) -> StoreError {
    error!(operation = operation, error = %e, "Unable to query database");
    StoreError::QueryFailed {
        operation,
        source: e,
    }
}

fn scan_failed(operation: &'static str, e: sqlx::Error) -> StoreError {
    error!(operation = operation, error = %e, "Unable to scan rows");
    StoreError::ScanFailed {
        operation,
        source: e,
    }
}

fn text(row: &PgRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
}

fn collected_from_row(row: &PgRow) -> Result<CollectedEvent, sqlx::Error> {
    Ok(CollectedEvent {
        frontend_name: text(row, "frontend")?,
        backend: text(row, "backend")?,
        ip: text(row, "ip")?,
        port: row.try_get::<Option<i32>, _>("port")?.unwrap_or_default(),
        path: text(row, "path")?,
        method: text(row, "method")?,
        x_forward_for: text(row, "xforwardfor")?,
        x_real_ip: text(row, "xrealip")?,
        user_agent: text(row, "useragent")?,
        via: text(row, "via")?,
        age: text(row, "age")?,
        time_date: row.try_get::<Option<i64>, _>("timedate")?.unwrap_or_default(),
        cf_ip_country: text(row, "cfipcountry")?,
        checked: row.try_get::<Option<bool>, _>("checked")?.unwrap_or_default(),
        banned: row.try_get::<Option<bool>, _>("banned")?.unwrap_or_default(),
    })
}

fn banned_from_row(row: &PgRow) -> Result<BannedEntity, sqlx::Error> {
    Ok(BannedEntity {
        frontend_name: String::new(),
        ip: text(row, "ip")?,
        domain_name: text(row, "domainname")?,
        time_checked: row.try_get::<Option<i64>, _>("timechecked")?.unwrap_or_default(),
        time_banned: row.try_get::<Option<i64>, _>("timebanned")?.unwrap_or_default(),
        // a row in banned_entities means the address is banned
        banned: true,
    })
}
