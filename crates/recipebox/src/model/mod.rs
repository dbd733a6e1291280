//! Core data types for recipebox.
//!
//! These are the records stored in the database and the drafts and edits
//! that produce them. They carry their own field validation; ownership and
//! uniqueness rules are enforced by [`crate::service::RecipeBox`].

mod profile;
mod rating;
mod recipe;
mod steps;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use profile::{Profile, ProfileChanges, MAX_BIO_LEN, MAX_DISPLAY_NAME_LEN};
pub use rating::{normalize_review, Rating, RatingSummary, Review, Score};
pub use recipe::{
    Difficulty, NewRecipe, Recipe, RecipeCard, RecipeChanges, MAX_DESCRIPTION_LEN, MAX_MINUTES,
    MAX_SERVINGS, MAX_STEPS, MAX_STEP_LEN, MAX_TITLE_LEN,
};
pub use steps::StepList;

/// A recipe category from the fixed taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    /// Identifier.
    pub id: i64,
    /// Unique name, e.g. `Breakfast`.
    pub name: String,
    /// Emoji shown next to the name.
    pub emoji: String,
    /// One-line description.
    pub description: String,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji, self.name)
    }
}

/// A user's favorite mark on a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    /// The favorited recipe.
    pub recipe_id: i64,
    /// The user who favorited it.
    pub user_id: String,
    /// When it was favorited.
    pub created_at: DateTime<Utc>,
}

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque bearer token (UUID v4).
    pub token: String,
    /// Profile id of the signed-in user.
    pub user_id: String,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
