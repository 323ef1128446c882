//! # Schema Setup
//!
//! The initial schema is embedded in the binary and applied on open.
//!
//! ## Process
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Schema Setup                                       │
//! │                                                                         │
//! │  Database::new(config)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  _sqlx_migrations present? ── no ──► create it                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  0001_initial_schema.sql applied? ── yes ──► nothing to do             │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  CREATE TABLE cart_items / orders / order_items (one transaction)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  checksum recorded in _sqlx_migrations                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the initial schema ships with this crate. A file whose recorded
//! checksum no longer matches the embedded one fails with
//! `DbError::MigrationFailed` instead of being altered in place.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

/// Migrations embedded from `migrations/sqlite` at compile time.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies any embedded migration not yet recorded. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(embedded = MIGRATOR.migrations.len(), "Checking schema");

    MIGRATOR.run(pool).await?;

    info!("Schema up to date");
    Ok(())
}

/// Schema bookkeeping for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migrations compiled into this build.
    pub embedded: usize,
    /// Migrations recorded as applied in the database.
    pub applied: usize,
}

impl MigrationStatus {
    /// True when every embedded migration has been applied.
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded
    }
}

/// Reports embedded versus applied migrations.
///
/// A database that was never migrated reports `applied == 0`.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<MigrationStatus> {
    let tracked: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied: i64 = match tracked {
        Some(_) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(pool)
                .await?
        }
        None => 0,
    };

    Ok(MigrationStatus {
        embedded: MIGRATOR.migrations.len(),
        applied: usize::try_from(applied).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_status_before_and_after() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();

        let before = migration_status(db.pool()).await.unwrap();
        assert_eq!(before.applied, 0);
        assert!(!before.is_current());

        db.run_migrations().await.unwrap();
        db.run_migrations().await.unwrap();

        let after = migration_status(db.pool()).await.unwrap();
        assert_eq!(after.embedded, 1);
        assert_eq!(after.applied, 1);
        assert!(after.is_current());
    }

    #[tokio::test]
    async fn test_schema_tables_created() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name IN ('cart_items', 'orders', 'order_items') ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        assert_eq!(tables, vec!["cart_items", "order_items", "orders"]);
    }
}
