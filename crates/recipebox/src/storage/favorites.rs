//! Favorite queries.

use chrono::Utc;
use rusqlite::{params, Row};

use super::{format_time, time_column, Storage};
use crate::error::Result;
use crate::model::Favorite;

impl Storage {
    /// Mark a recipe as a favorite of a user.
    ///
    /// Returns `true` if the mark was added, `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the recipe or user does not exist or the database
    /// operation fails.
    pub fn add_favorite(&self, recipe_id: i64, user_id: &str) -> Result<bool> {
        let inserted = self.conn.execute(
            r"
            INSERT OR IGNORE INTO recipe_favorites (recipe_id, user_id, created_at)
            VALUES (?1, ?2, ?3)
            ",
            params![recipe_id, user_id, format_time(&Utc::now())],
        )?;
        Ok(inserted > 0)
    }

    /// Remove a favorite mark.
    ///
    /// Returns `true` if a mark was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_favorite(&self, recipe_id: i64, user_id: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM recipe_favorites WHERE recipe_id = ?1 AND user_id = ?2",
            params![recipe_id, user_id],
        )?;
        Ok(deleted > 0)
    }

    /// Whether the user has favorited the recipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn is_favorite(&self, recipe_id: i64, user_id: &str) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM recipe_favorites WHERE recipe_id = ?1 AND user_id = ?2)",
            params![recipe_id, user_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// A user's favorite marks, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn favorites_for_user(&self, user_id: &str) -> Result<Vec<Favorite>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT recipe_id, user_id, created_at
            FROM recipe_favorites
            WHERE user_id = ?1
            ORDER BY created_at DESC, recipe_id DESC
            ",
        )?;
        let favorites = stmt
            .query_map([user_id], row_to_favorite)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(favorites)
    }

    /// Number of users who favorited a recipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn favorite_count(&self, recipe_id: i64) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM recipe_favorites WHERE recipe_id = ?1",
            [recipe_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_favorite(row: &Row<'_>) -> rusqlite::Result<Favorite> {
    Ok(Favorite {
        recipe_id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: time_column(row, 2)?,
    })
}
