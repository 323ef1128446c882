//! Shared setup for integration tests: a file-backed database in a
//! temporary directory, removed when the returned guard drops.

#![allow(dead_code)]

use std::time::Duration;

use tempfile::TempDir;
use tienda_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// Upper bound on any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Routes `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Opens a fresh database file. Keep the `TempDir` alive for the test.
pub async fn open() -> (TempDir, Database) {
    init_tracing();

    let dir = TempDir::new().expect("create temp dir");
    let config = DbConfig::new(dir.path().join("tienda.db"));
    let db = Database::new(config).await.expect("open database");

    (dir, db)
}
