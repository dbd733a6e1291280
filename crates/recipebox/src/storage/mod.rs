//! Storage layer for recipebox.
//!
//! This module provides `SQLite`-based persistent storage for profiles,
//! sessions, categories, recipes, ratings and favorites. Each table's
//! queries live in their own submodule as an `impl Storage` block.

mod categories;
mod favorites;
pub mod migrations;
mod profiles;
mod ratings;
mod recipes;
pub mod schema;
mod sessions;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Storage engine for the recipe community.
///
/// Foreign keys are enforced, so deleting a recipe removes its ratings and
/// favorites and deleting a profile removes everything that user owns.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        register_functions(&conn)?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        register_functions(&conn)?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether any recipe image or profile avatar references `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn image_in_use(&self, key: &str) -> Result<bool> {
        let used: bool = self.conn.query_row(
            r"
            SELECT EXISTS (SELECT 1 FROM recipes WHERE image = ?1)
                OR EXISTS (SELECT 1 FROM profiles WHERE avatar = ?1)
            ",
            [key],
            |row| row.get(0),
        )?;
        Ok(used)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let count = |table: &str| -> Result<i64> {
            let n = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                })?;
            Ok(n)
        };

        let newest: Option<String> = self
            .conn
            .query_row(
                "SELECT created_at FROM recipes ORDER BY created_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let newest_recipe = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            profiles: count("profiles")?,
            recipes: count("recipes")?,
            ratings: count("recipe_ratings")?,
            favorites: count("recipe_favorites")?,
            sessions: count("sessions")?,
            newest_recipe,
            db_size_bytes,
        })
    }
}

/// Register the SQL functions the queries rely on.
///
/// `casefold(text)` lower-cases with full Unicode rules; the built-in
/// `lower()` and `LIKE` only fold ASCII. `NULL` stays `NULL`.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )?;
    Ok(())
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of registered users.
    pub profiles: i64,
    /// Number of recipes.
    pub recipes: i64,
    /// Number of ratings.
    pub ratings: i64,
    /// Number of favorite marks.
    pub favorites: i64,
    /// Number of stored sessions, expired ones included.
    pub sessions: i64,
    /// When the newest recipe was created.
    pub newest_recipe: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Format a timestamp for storage.
///
/// Fixed-width UTC so that text comparison in SQL matches time order.
pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Read a stored timestamp column.
pub(crate) fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, Type::Text, format!("bad timestamp {text:?}: {e}")))
}

/// Build a column conversion error.
pub(crate) fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, message.into())
}

/// Convert a `LIMIT`/`OFFSET` value for binding.
pub(crate) fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
