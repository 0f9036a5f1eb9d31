//! Database schema bootstrap
//!
//! Bootstrap never alters an existing table: it either finds the primary
//! table and stops, or creates all tables in a fixed order.

use sqlx::postgres::PgPool;
use tracing::{debug, error, info};

use super::database::Database;
use super::models::SchemaStatus;
use crate::error::StoreError;

pub const COLLECTED_EVENTS: &str = "collected_events";
pub const CHECKED_ENTITIES: &str = "checked_entities";
pub const BANNED_ENTITIES: &str = "banned_entities";

/// A table created verbatim during bootstrap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static str,
}

impl TableDef {
    pub fn create_statement(&self) -> String {
        format!("CREATE TABLE {} ({})", self.name, self.columns)
    }
}

/// Tables in creation order; the first one is the existence probe target
pub const TABLES: [TableDef; 3] = [
    TableDef {
        name: COLLECTED_EVENTS,
        columns: r#"
            unique_id SERIAL NOT NULL,
            frontend TEXT,
            backend TEXT,
            ip TEXT,
            port INT,
            path TEXT,
            method TEXT,
            xforwardfor TEXT,
            xrealip TEXT,
            useragent TEXT,
            via TEXT,
            age TEXT,
            timedate BIGINT,
            checked BOOL,
            banned BOOL,
            cfipcountry TEXT,
            PRIMARY KEY (unique_id)
        "#,
    },
    TableDef {
        name: CHECKED_ENTITIES,
        columns: r#"
            unique_id SERIAL NOT NULL,
            ip TEXT,
            domainname TEXT,
            timechecked BIGINT,
            PRIMARY KEY (unique_id)
        "#,
    },
    TableDef {
        name: BANNED_ENTITIES,
        columns: r#"
            unique_id SERIAL NOT NULL,
            ip TEXT,
            domainname TEXT,
            timechecked BIGINT,
            timebanned BIGINT,
            PRIMARY KEY (unique_id)
        "#,
    },
];

/// Catalog access needed by the bootstrapper
pub(crate) trait SchemaCatalog {
    async fn table_exists(&mut self, table: &str) -> Result<bool, sqlx::Error>;
    async fn create_table(&mut self, table: &TableDef) -> Result<(), sqlx::Error>;
}

struct PgCatalog<'a>(&'a PgPool);

impl SchemaCatalog for PgCatalog<'_> {
    async fn table_exists(&mut self, table: &str) -> Result<bool, sqlx::Error> {
        // to_regclass resolves through search_path and returns NULL for a missing relation
        sqlx::query_scalar("SELECT to_regclass($1::text) IS NOT NULL")
            .bind(table)
            .fetch_one(self.0)
            .await
    }

    async fn create_table(&mut self, table: &TableDef) -> Result<(), sqlx::Error> {
        sqlx::query(&table.create_statement())
            .execute(self.0)
            .await
            .map(|_| ())
    }
}

/// Ensure the three tables exist on the given handle.
pub async fn ensure_schema(db: &Database) -> Result<SchemaStatus, StoreError> {
    bootstrap(&mut PgCatalog(&db.pool)).await
}

pub(crate) async fn bootstrap<C: SchemaCatalog>(
    catalog: &mut C,
) -> Result<SchemaStatus, StoreError> {
    let primary = TABLES[0].name;
    debug!(table = primary, "Checking if table exists");

    let exists = catalog.table_exists(primary).await.map_err(|e| {
        error!(table = primary, error = %e, "Unable to probe table");
        StoreError::SchemaProbeFailed {
            table: primary,
            source: e,
        }
    })?;

    if exists {
        debug!(table = primary, "Table found, skipping schema creation");
        return Ok(SchemaStatus::AlreadyExists);
    }

    info!(table = primary, "Table not found, creating database schema");
    for table in &TABLES {
        catalog.create_table(table).await.map_err(|e| {
            error!(table = table.name, error = %e, "Unable to create table");
            StoreError::SchemaCreateFailed {
                table: table.name,
                source: e,
            }
        })?;
        info!(table = table.name, "Table created");
    }

    Ok(SchemaStatus::Created)
}
