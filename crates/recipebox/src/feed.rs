//! Community feed queries.
//!
//! A [`FeedQuery`] combines any number of filters with a sort order and a
//! page window. Storage turns it into a single SQL query; see
//! [`crate::storage::Storage::feed`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Difficulty;

/// Page size used when a query does not set one.
pub const DEFAULT_LIMIT: usize = 20;

/// Feed sort order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSort {
    /// Most recently created first.
    #[default]
    Newest,
    /// Oldest first.
    Oldest,
    /// Highest average rating first; unrated recipes last.
    TopRated,
    /// Shortest total time first.
    Quickest,
    /// Most favorited first.
    MostFavorited,
}

impl FeedSort {
    /// All sort orders.
    pub const ALL: [Self; 5] = [
        Self::Newest,
        Self::Oldest,
        Self::TopRated,
        Self::Quickest,
        Self::MostFavorited,
    ];

    /// The snake-case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::TopRated => "top_rated",
            Self::Quickest => "quickest",
            Self::MostFavorited => "most_favorited",
        }
    }
}

impl fmt::Display for FeedSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|sort| sort.as_str() == normalized)
            .ok_or_else(|| Error::validation("sort", format!("unknown sort order '{s}'")))
    }
}

/// Filters, order and window for the community feed.
///
/// Every filter is optional and filters combine with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedQuery {
    /// Case-insensitive substring matched against title, description and
    /// ingredients.
    pub search: Option<String>,
    /// Only recipes in this category.
    pub category_id: Option<i64>,
    /// Only recipes of this difficulty.
    pub difficulty: Option<Difficulty>,
    /// Only recipes whose prep plus cook time is at most this.
    pub max_total_minutes: Option<u32>,
    /// Only recipes by this author.
    pub author_id: Option<String>,
    /// Only recipes this user has favorited.
    pub favorited_by: Option<String>,
    /// Only recipes whose average rating is at least this.
    pub min_rating: Option<f64>,
    /// Sort order.
    pub sort: FeedSort,
    /// Maximum number of results.
    pub limit: usize,
    /// Number of results to skip.
    pub offset: usize,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            search: None,
            category_id: None,
            difficulty: None,
            max_total_minutes: None,
            author_id: None,
            favorited_by: None,
            min_rating: None,
            sort: FeedSort::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl FeedQuery {
    /// The unfiltered feed, newest first.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by free text. Blank text clears the filter.
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = text.trim();
        self.search = (!text.is_empty()).then(|| text.to_string());
        self
    }

    /// Filter by category.
    #[must_use]
    pub fn category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Filter by difficulty.
    #[must_use]
    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    /// Filter by maximum total time.
    #[must_use]
    pub fn max_total_minutes(mut self, minutes: u32) -> Self {
        self.max_total_minutes = Some(minutes);
        self
    }

    /// Filter by author.
    #[must_use]
    pub fn author(mut self, user_id: impl Into<String>) -> Self {
        self.author_id = Some(user_id.into());
        self
    }

    /// Only recipes favorited by this user.
    #[must_use]
    pub fn favorited_by(mut self, user_id: impl Into<String>) -> Self {
        self.favorited_by = Some(user_id.into());
        self
    }

    /// Only recipes rated at least this on average.
    #[must_use]
    pub fn min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    /// Set the sort order.
    #[must_use]
    pub fn sort(mut self, sort: FeedSort) -> Self {
        self.sort = sort;
        self
    }

    /// Set the page window.
    #[must_use]
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Check the filter values.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `min_rating` is outside 1 to 5.
    pub fn validate(&self) -> Result<()> {
        if let Some(rating) = self.min_rating {
            if !(1.0..=5.0).contains(&rating) {
                return Err(Error::validation(
                    "min_rating",
                    "must be between 1 and 5",
                ));
            }
        }
        Ok(())
    }

    /// The lower-cased `LIKE` pattern for the search text, if any. It is
    /// matched against `casefold()`ed columns.
    ///
    /// `%`, `_` and the escape character itself are matched literally.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|text| {
            let text = text.to_lowercase();
            let mut pattern = String::with_capacity(text.len() + 2);
            pattern.push('%');
            for c in text.chars() {
                if matches!(c, '%' | '_' | LIKE_ESCAPE) {
                    pattern.push(LIKE_ESCAPE);
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }
}

/// Escape character used in `LIKE ... ESCAPE` clauses.
pub(crate) const LIKE_ESCAPE: char = '\\';
