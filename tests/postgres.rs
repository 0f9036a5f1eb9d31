//! Storage tests against a live PostgreSQL server.
//!
//! Requires DBHOST, DBPORT, DBUSER, DBPASS and DBNAME; skipped otherwise.
//! Every test runs in its own throwaway schema.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use zehd_backend::error::StoreError;
use zehd_backend::storage::{
    BannedEntity, CollectedEvent, ConnectionConfig, Database, PoolSettings, SchemaStatus, TABLES,
    ensure_schema,
};

static SCHEMA_COUNTER: AtomicU32 = AtomicU32::new(0);

struct TestSchema {
    admin: Database,
    db: Database,
    name: String,
}

impl TestSchema {
    async fn create() -> Option<Self> {
        let base = match ConnectionConfig::resolve() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("database not configured ({e}): skipping test");
                return None;
            }
        };
        let settings = PoolSettings {
            max_connections: 2,
            ..Default::default()
        };

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .subsec_nanos();
        let name = format!(
            "zehd_test_{}_{}_{}",
            std::process::id(),
            nanos,
            SCHEMA_COUNTER.fetch_add(1, Ordering::SeqCst)
        );

        let admin = Database::connect(&base, &settings).await.expect("connect");
        sqlx::query(&format!("CREATE SCHEMA {name}"))
            .execute(admin.pool())
            .await
            .expect("create schema");

        let scoped = ConnectionConfig {
            schema: Some(name.clone()),
            ..base
        };
        let db = Database::connect(&scoped, &settings)
            .await
            .expect("connect scoped");

        Some(Self { admin, db, name })
    }

    async fn cleanup(self) {
        self.db.close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.name))
            .execute(self.admin.pool())
            .await
            .expect("drop schema");
        self.admin.close().await;
    }

    async fn table_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = $1")
            .bind(&self.name)
            .fetch_one(self.admin.pool())
            .await
            .expect("count tables")
    }
}

fn login_event() -> CollectedEvent {
    CollectedEvent {
        frontend_name: "edge-1".to_string(),
        ip: "203.0.113.5".to_string(),
        port: 443,
        path: "/login".to_string(),
        method: "POST".to_string(),
        time_date: 1_700_000_000,
        // ignored by the store
        backend: "spoofed".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn ensure_schema_is_idempotent() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };

    assert_eq!(schema.table_count().await, 0);
    assert_eq!(
        ensure_schema(&schema.db).await.expect("first bootstrap"),
        SchemaStatus::Created
    );
    assert_eq!(schema.table_count().await, TABLES.len() as i64);
    assert_eq!(
        ensure_schema(&schema.db).await.expect("second bootstrap"),
        SchemaStatus::AlreadyExists
    );
    assert_eq!(schema.table_count().await, TABLES.len() as i64);

    schema.cleanup().await;
}

#[tokio::test]
async fn insert_then_fetch_all_returns_the_event() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    ensure_schema(&schema.db).await.expect("bootstrap");

    schema
        .db
        .insert_collected_event(&login_event())
        .await
        .expect("insert");

    let events = schema.db.fetch_all_collected_events().await.expect("fetch all");
    let matching: Vec<_> = events
        .iter()
        .filter(|e| e.ip == "203.0.113.5" && e.path == "/login")
        .collect();

    assert_eq!(matching.len(), 1);
    let stored = matching[0];
    assert_eq!(stored.method, "POST");
    assert_eq!(stored.time_date, 1_700_000_000);
    assert_eq!(stored.port, 443);
    assert_eq!(stored.frontend_name, "edge-1");
    assert_eq!(stored.backend, schema.db.backend());

    schema.cleanup().await;
}

#[tokio::test]
async fn insert_without_schema_is_reported() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };

    let result = schema.db.insert_collected_event(&login_event()).await;
    assert!(matches!(
        result,
        Err(StoreError::QueryFailed {
            operation: "insert_collected_event",
            ..
        })
    ));

    schema.cleanup().await;
}

#[tokio::test]
async fn lookup_without_match_returns_zero_value() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    ensure_schema(&schema.db).await.expect("bootstrap");

    let entity = schema
        .db
        .lookup_banned_entity("1.2.3.4")
        .await
        .expect("lookup");
    assert_eq!(entity, BannedEntity::default());
    assert!(!entity.banned);

    schema.cleanup().await;
}

#[tokio::test]
async fn lookup_banned_entity_single_and_ambiguous() {
    let Some(schema) = TestSchema::create().await else {
        return;
    };
    ensure_schema(&schema.db).await.expect("bootstrap");

    let insert = "INSERT INTO banned_entities (ip, domainname, timechecked, timebanned) \
                  VALUES ($1, $2, $3, $4)";
    sqlx::query(insert)
        .bind("198.51.100.23")
        .bind("example.net")
        .bind(1_700_000_000_i64)
        .bind(1_700_000_100_i64)
        .execute(schema.db.pool())
        .await
        .expect("seed banned entity");

    let entity = schema
        .db
        .lookup_banned_entity("198.51.100.23")
        .await
        .expect("lookup");
    assert!(entity.banned);
    assert_eq!(entity.ip, "198.51.100.23");
    assert_eq!(entity.domain_name, "example.net");
    assert_eq!(entity.time_checked, 1_700_000_000);
    assert_eq!(entity.time_banned, 1_700_000_100);

    sqlx::query(insert)
        .bind("198.51.100.23")
        .bind("example.org")
        .bind(1_700_000_200_i64)
        .bind(1_700_000_300_i64)
        .execute(schema.db.pool())
        .await
        .expect("seed duplicate");

    assert!(matches!(
        schema.db.lookup_banned_entity("198.51.100.23").await,
        Err(StoreError::AmbiguousMatch { count: 2, .. })
    ));

    schema.cleanup().await;
}
