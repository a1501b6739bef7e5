//! SQLite connection factory and migration runner.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    module     TEXT NOT NULL,
    id         TEXT NOT NULL,
    applied_at INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int)),
    PRIMARY KEY (module, id)
);";

/// Migration definition contributed by a module
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// Shared handle to the application database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("failed to enable WAL journal")?;
        tracing::debug!(target: "bookshelf-db", %journal_mode, "journal mode set");

        tracing::info!(target: "bookshelf-db", path = %path.display(), "database opened");
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        conn.execute_batch(MIGRATIONS_TABLE)
            .context("failed to create migrations table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The underlying connection, shared with stores built on top of it.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection mutex poisoned"))
    }

    /// Apply every migration that has not been recorded yet.
    ///
    /// Each migration runs in its own transaction together with its
    /// bookkeeping row. Returns the number of migrations applied.
    pub fn run_migrations(&self, migrations: &[(String, Migration)]) -> Result<usize> {
        let mut conn = self.lock()?;
        let mut applied = 0;

        for (module, migration) in migrations {
            let already_applied: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE module = ?1 AND id = ?2)",
                params![module, migration.id],
                |row| row.get(0),
            )?;
            if already_applied {
                tracing::debug!(target: "bookshelf-db", %module, id = migration.id, "migration already applied");
                continue;
            }

            let tx = conn.transaction()?;
            tx.execute_batch(migration.up).with_context(|| {
                format!("migration '{}' of module '{}' failed", migration.id, module)
            })?;
            tx.execute(
                "INSERT INTO schema_migrations (module, id) VALUES (?1, ?2)",
                params![module, migration.id],
            )?;
            tx.commit()?;

            tracing::info!(target: "bookshelf-db", %module, id = migration.id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    /// List `(module, id)` pairs of applied migrations in application order.
    pub fn applied_migrations(&self) -> Result<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT module, id FROM schema_migrations ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
