//! Category queries. The taxonomy is seeded by the migrations and read-only.

use rusqlite::{OptionalExtension, Row};

use super::Storage;
use crate::error::Result;
use crate::model::Category;

impl Storage {
    /// List all categories by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, emoji, description FROM categories ORDER BY name")?;
        let categories = stmt
            .query_map([], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Get a category by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, emoji, description FROM categories WHERE id = ?1",
                [id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Get a category by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, name, emoji, description FROM categories WHERE name = ?1",
                [name.trim()],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }
}

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        emoji: row.get(2)?,
        description: row.get(3)?,
    })
}
