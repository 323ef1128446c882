//! # Record Schema
//!
//! Declarative column metadata per record, and the statement templates
//! derived from it.
//!
//! ## Why Metadata?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Record::COLUMNS (declaration order, identity first)                    │
//! │                                                                         │
//! │  cart_items: id │ productId │ name  │ price │ quantity                  │
//! │              ?1 │ ?2        │ ?3    │ ?4    │ ?5                        │
//! │                                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Statements::for_record::<CartItem>()                                  │
//! │  ├── INSERT OR ABORT   INTO cart_items (id, ...) VALUES (?1, ...)      │
//! │  ├── INSERT OR REPLACE INTO cart_items (id, ...) VALUES (?1, ...)      │
//! │  ├── UPDATE OR ABORT cart_items SET productId = ?2, ... WHERE id = ?1  │
//! │  ├── DELETE FROM cart_items WHERE id = ?1                              │
//! │  ├── DELETE FROM cart_items                                            │
//! │  └── SELECT id, productId, ... FROM cart_items                         │
//! │                                                                         │
//! │  Record::bind_columns binds in the same order, so one binder serves    │
//! │  insert and update alike.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `None` identity binds as NULL, and SQLite assigns the next rowid.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite, SqliteConnection};
use tracing::trace;

use crate::error::DbResult;
use crate::notify::Table;

/// A positional query ready for binding.
pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

// =============================================================================
// Column Metadata
// =============================================================================

/// SQLite storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Integer,
    Real,
    Text,
}

impl StorageType {
    /// Type name as declared in the migration DDL.
    pub const fn declared_type(self) -> &'static str {
        match self {
            StorageType::Integer => "INTEGER",
            StorageType::Real => "REAL",
            StorageType::Text => "TEXT",
        }
    }
}

/// One persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub storage: StorageType,
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str, storage: StorageType, nullable: bool) -> Self {
        Column {
            name,
            storage,
            nullable,
        }
    }
}

/// What a write does when it clashes with an existing identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Reject the statement and roll back.
    Abort,
    /// Delete the clashing row and write the new one.
    Replace,
}

impl ConflictPolicy {
    const fn clause(self) -> &'static str {
        match self {
            ConflictPolicy::Abort => "OR ABORT",
            ConflictPolicy::Replace => "OR REPLACE",
        }
    }
}

// =============================================================================
// Record Trait
// =============================================================================

/// A record stored one-to-one in a table.
pub trait Record: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    /// Table holding this record.
    const TABLE: Table;

    /// Name used in errors and logs.
    const ENTITY: &'static str;

    /// Columns in declaration order. The first is the integer identity.
    const COLUMNS: &'static [Column];

    /// Current identity, if assigned.
    fn id(&self) -> Option<i64>;

    /// Binds one value per column, in [`Record::COLUMNS`] order.
    fn bind_columns<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;
}

// =============================================================================
// Statement Templates
// =============================================================================

/// Fixed SQL for one record type.
#[derive(Debug, Clone)]
pub struct Statements {
    pub insert_abort: String,
    pub insert_replace: String,
    pub update: String,
    pub delete_by_id: String,
    pub clear: String,
    /// `SELECT <all columns> FROM <table>`, without WHERE/ORDER.
    pub select: String,
}

impl Statements {
    /// Renders every template for `R`.
    pub fn for_record<R: Record>() -> Self {
        let table = R::TABLE.name();
        let id = R::COLUMNS[0].name;
        let names: Vec<&str> = R::COLUMNS.iter().map(|c| c.name).collect();
        let placeholders: Vec<String> = (1..=R::COLUMNS.len()).map(|i| format!("?{i}")).collect();

        let insert = |policy: ConflictPolicy| {
            format!(
                "INSERT {} INTO {table} ({}) VALUES ({})",
                policy.clause(),
                names.join(", "),
                placeholders.join(", ")
            )
        };

        let assignments: Vec<String> = names
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, name)| format!("{name} = ?{}", i + 1))
            .collect();

        Statements {
            insert_abort: insert(ConflictPolicy::Abort),
            insert_replace: insert(ConflictPolicy::Replace),
            update: format!(
                "UPDATE {} {table} SET {} WHERE {id} = ?1",
                ConflictPolicy::Abort.clause(),
                assignments.join(", ")
            ),
            delete_by_id: format!("DELETE FROM {table} WHERE {id} = ?1"),
            clear: format!("DELETE FROM {table}"),
            select: format!("SELECT {} FROM {table}", names.join(", ")),
        }
    }

    /// Insert statement for `policy`.
    pub fn insert(&self, policy: ConflictPolicy) -> &str {
        match policy {
            ConflictPolicy::Abort => &self.insert_abort,
            ConflictPolicy::Replace => &self.insert_replace,
        }
    }
}

// =============================================================================
// Generic Operations
// =============================================================================
// These run on a caller-provided connection so repositories can compose
// several of them inside one WriteTx.

/// Inserts `record`, returning the rowid it was stored under.
pub(crate) async fn insert_record<R: Record>(
    conn: &mut SqliteConnection,
    statements: &Statements,
    policy: ConflictPolicy,
    record: &R,
) -> DbResult<i64> {
    let sql = statements.insert(policy);
    trace!(entity = R::ENTITY, id = ?record.id(), ?policy, "Binding insert");

    let result = record.bind_columns(sqlx::query(sql)).execute(conn).await?;
    Ok(result.last_insert_rowid())
}

/// Rewrites every column of the row matching `record`'s identity.
///
/// ## Returns
/// Rows affected (0 when the identity is unknown).
pub(crate) async fn update_record<R: Record>(
    conn: &mut SqliteConnection,
    statements: &Statements,
    record: &R,
) -> DbResult<u64> {
    trace!(entity = R::ENTITY, id = ?record.id(), "Binding update");

    let result = record
        .bind_columns(sqlx::query(&statements.update))
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes the row with identity `id`.
pub(crate) async fn delete_by_id(
    conn: &mut SqliteConnection,
    statements: &Statements,
    id: i64,
) -> DbResult<u64> {
    let result = sqlx::query(&statements.delete_by_id)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes every row of the table.
pub(crate) async fn clear_table(conn: &mut SqliteConnection, statements: &Statements) -> DbResult<u64> {
    let result = sqlx::query(&statements.clear).execute(conn).await?;
    Ok(result.rows_affected())
}
