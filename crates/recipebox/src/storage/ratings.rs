//! Rating queries.

use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{conversion_error, format_time, time_column, Storage};
use crate::error::Result;
use crate::model::{Rating, Review, Score};

const RATING_COLUMNS: &str =
    "rt.recipe_id, rt.user_id, rt.score, rt.review, rt.created_at, rt.updated_at";

impl Storage {
    /// Insert a rating, or replace the score and review of an existing one.
    ///
    /// The original `created_at` is kept on update.
    ///
    /// # Errors
    ///
    /// Returns an error if the recipe or user does not exist or the database
    /// operation fails.
    pub fn upsert_rating(&self, rating: &Rating) -> Result<()> {
        self.conn.execute(
            r"
            INSERT INTO recipe_ratings (recipe_id, user_id, score, review, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (recipe_id, user_id) DO UPDATE SET
                score = excluded.score,
                review = excluded.review,
                updated_at = excluded.updated_at
            ",
            params![
                rating.recipe_id,
                rating.user_id,
                rating.score.value(),
                rating.review,
                format_time(&rating.created_at),
                format_time(&rating.updated_at),
            ],
        )?;
        debug!(
            "Saved rating {} for recipe {} by {}",
            rating.score, rating.recipe_id, rating.user_id
        );
        Ok(())
    }

    /// Get one user's rating of a recipe.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_rating(&self, recipe_id: i64, user_id: &str) -> Result<Option<Rating>> {
        let rating = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RATING_COLUMNS} FROM recipe_ratings rt \
                     WHERE rt.recipe_id = ?1 AND rt.user_id = ?2"
                ),
                params![recipe_id, user_id],
                row_to_rating,
            )
            .optional()?;
        Ok(rating)
    }

    /// Delete one user's rating of a recipe.
    ///
    /// Returns `true` if a rating was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_rating(&self, recipe_id: i64, user_id: &str) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM recipe_ratings WHERE recipe_id = ?1 AND user_id = ?2",
            params![recipe_id, user_id],
        )?;
        Ok(deleted > 0)
    }

    /// All ratings of a recipe with reviewer names, most recently changed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ratings_for_recipe(&self, recipe_id: i64) -> Result<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {RATING_COLUMNS}, p.username
            FROM recipe_ratings rt
            JOIN profiles p ON p.id = rt.user_id
            WHERE rt.recipe_id = ?1
            ORDER BY rt.updated_at DESC, p.username
            "
        ))?;
        let reviews = stmt
            .query_map([recipe_id], |row| {
                Ok(Review {
                    rating: row_to_rating(row)?,
                    reviewer: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(reviews)
    }

    /// All ratings a user has given, most recently changed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ratings_by_user(&self, user_id: &str) -> Result<Vec<Rating>> {
        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {RATING_COLUMNS}
            FROM recipe_ratings rt
            WHERE rt.user_id = ?1
            ORDER BY rt.updated_at DESC, rt.recipe_id DESC
            "
        ))?;
        let ratings = stmt
            .query_map([user_id], row_to_rating)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ratings)
    }
}

fn row_to_rating(row: &Row<'_>) -> rusqlite::Result<Rating> {
    let raw: u8 = row.get(2)?;
    let score = Score::new(raw)
        .map_err(|e| conversion_error(2, Type::Integer, e.to_string()))?;

    Ok(Rating {
        recipe_id: row.get(0)?,
        user_id: row.get(1)?,
        score,
        review: row.get(3)?,
        created_at: time_column(row, 4)?,
        updated_at: time_column(row, 5)?,
    })
}
