//! Session queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{format_time, time_column, Storage};
use crate::error::Result;
use crate::model::Session;

impl Storage {
    /// Store a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_session(&self, session: &Session) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![
                session.token,
                session.user_id,
                format_time(&session.created_at),
                format_time(&session.expires_at),
            ],
        )?;
        debug!("Opened session for {}", session.user_id);
        Ok(())
    }

    /// Get a session by token, expired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let session = self
            .conn
            .query_row(
                "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
                [token],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    /// Delete a session.
    ///
    /// Returns `true` if a session was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", [token])?;
        Ok(affected > 0)
    }

    /// Delete every session of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_sessions_for_user(&self, user_id: &str) -> Result<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
        Ok(affected)
    }

    /// Delete sessions that expired at or before `now`.
    ///
    /// Returns the number of sessions deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn prune_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            [format_time(&now)],
        )?;
        if deleted > 0 {
            debug!("Pruned {} expired sessions", deleted);
        }
        Ok(deleted)
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        token: row.get(0)?,
        user_id: row.get(1)?,
        created_at: time_column(row, 2)?,
        expires_at: time_column(row, 3)?,
    })
}
