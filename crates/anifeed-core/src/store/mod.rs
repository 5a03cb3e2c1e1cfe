//! Durable storage for anifeed.
//!
//! A single SQLite database holds the source tables (users, catalog, ratings,
//! reviews, posts), the derived `activities` projection, both engagement
//! families, per-user stats, and the append-only event log.

#![allow(clippy::missing_errors_doc)]

pub mod catalog;
pub mod event_log;
pub mod schema;
pub mod sources;
pub mod users;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::debug;

use crate::config::FeedConfig;
use schema::{MIGRATIONS, MIGRATIONS_TABLE_SQL};

/// Handle on the anifeed database.
///
/// One handle owns one connection. Threads that write concurrently open their
/// own handle on the same file; SQLite's writer lock serializes them.
pub struct FeedDb {
    conn: Connection,
}

impl FeedDb {
    /// Open or create a database at the given path.
    ///
    /// Creates parent directories if they don't exist.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, &FeedConfig::default())
    }

    /// Open or create a database, applying connection settings from `config`.
    pub fn open_with(path: &Path, config: &FeedConfig) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create parent directories: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")
            .context("Failed to configure database")?;
        conn.busy_timeout(config.busy_timeout)
            .context("Failed to set busy timeout")?;

        Ok(Self { conn })
    }

    /// Create an in-memory database (for tests and dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        Ok(Self { conn })
    }

    /// Apply any pending schema migrations.
    ///
    /// Returns the number of migrations applied by this call. Safe to call
    /// on every startup.
    pub fn init_schema(&self) -> Result<usize> {
        self.conn
            .execute_batch(MIGRATIONS_TABLE_SQL)
            .context("Failed to create schema_migrations")?;

        let current = self.schema_version()?;
        let mut applied = 0;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = self
                .conn
                .unchecked_transaction()
                .context("Failed to begin migration transaction")?;
            tx.execute_batch(migration.sql)
                .with_context(|| format!("Failed to apply migration {}", migration.name))?;
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
                params![migration.version, migration.name, fmt_ts(&Utc::now())],
            )
            .context("Failed to record migration")?;
            tx.commit().context("Failed to commit migration")?;

            debug!(version = migration.version, name = migration.name, "applied migration");
            applied += 1;
        }

        Ok(applied)
    }

    /// Highest applied migration version, 0 for an empty database.
    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .context("Failed to query schema version")
    }

    /// Begin a write transaction that takes the database writer lock up front.
    ///
    /// Dropping the transaction without committing rolls it back.
    pub fn begin_write(&self) -> Result<Transaction<'_>> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .context("Failed to begin write transaction")
    }

    /// Get a reference to the underlying connection (for advanced queries).
    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Canonical timestamp text: RFC 3339, microseconds, `Z` suffix.
///
/// Fixed width, so lexical order in SQL equals chronological order.
#[must_use]
pub fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`fmt_ts`].
pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp: {raw}"))?
        .with_timezone(&Utc))
}

/// Run `f` inside a named savepoint.
///
/// On error the savepoint is rolled back and the error returned; the
/// enclosing transaction stays usable.
pub fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    conn.execute_batch(&format!("SAVEPOINT {name}"))
        .with_context(|| format!("Failed to open savepoint {name}"))?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name}"))
                .with_context(|| format!("Failed to release savepoint {name}"))?;
            Ok(value)
        }
        Err(err) => {
            conn.execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))
                .with_context(|| format!("Failed to roll back savepoint {name}"))?;
            Err(err)
        }
    }
}

/// Next free id in `table`. Only meaningful inside a write transaction.
pub fn next_id(conn: &Connection, table: &str) -> Result<i64> {
    let max: i64 = conn
        .query_row(&format!("SELECT COALESCE(MAX(id), 0) FROM {table}"), [], |row| {
            row.get(0)
        })
        .with_context(|| format!("Failed to allocate id in {table}"))?;
    let seq: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM sqlite_sequence WHERE name = ?",
            params![table],
            |row| row.get(0),
        )
        .context("Failed to read sqlite_sequence")?;
    Ok(max.max(seq) + 1)
}
