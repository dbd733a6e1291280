//! Ratings, reviews and their aggregation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A star score between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    /// Lowest score.
    pub const MIN: u8 = 1;
    /// Highest score.
    pub const MAX: u8 = 5;

    /// Create a score.
    ///
    /// # Errors
    ///
    /// Returns a validation error unless `value` is in `1..=5`.
    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::validation(
                "score",
                format!(
                    "must be between {} and {}, got {value}",
                    Self::MIN,
                    Self::MAX
                ),
            ))
        }
    }

    /// The numeric value.
    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Render as filled and empty stars, e.g. `★★★☆☆`.
    #[must_use]
    pub fn stars(self) -> String {
        let filled = usize::from(self.0);
        let empty = usize::from(Self::MAX) - filled;
        format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
    }
}

impl TryFrom<u8> for Score {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One user's rating of one recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    /// The rated recipe.
    pub recipe_id: i64,
    /// The rating user.
    pub user_id: String,
    /// Star score.
    pub score: Score,
    /// Optional free-text review.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    /// First time the user rated the recipe.
    pub created_at: DateTime<Utc>,
    /// Last time the rating changed.
    pub updated_at: DateTime<Utc>,
}

/// A rating together with the reviewer's username, for review listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// The rating.
    #[serde(flatten)]
    pub rating: Rating,
    /// Username of the reviewer.
    pub reviewer: String,
}

/// Aggregate of all ratings of a recipe.
///
/// `histogram[n]` counts ratings with score `n + 1`; its buckets always sum
/// to `count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Number of ratings.
    pub count: u32,
    /// Mean score, `None` when there are no ratings.
    pub average: Option<f64>,
    /// Ratings per star score, one star first.
    pub histogram: [u32; 5],
}

impl RatingSummary {
    /// Aggregate a set of ratings.
    pub fn from_ratings<'a>(ratings: impl IntoIterator<Item = &'a Rating>) -> Self {
        let mut histogram = [0u32; 5];
        let mut count = 0u32;
        let mut sum = 0u64;

        for rating in ratings {
            let value = rating.score.value();
            histogram[usize::from(value - 1)] += 1;
            count += 1;
            sum += u64::from(value);
        }

        #[allow(clippy::cast_precision_loss)]
        let average = (count > 0).then(|| sum as f64 / f64::from(count));

        Self {
            count,
            average,
            histogram,
        }
    }

    /// Number of ratings with the given star score.
    #[must_use]
    pub fn count_for(&self, score: Score) -> u32 {
        self.histogram[usize::from(score.value() - 1)]
    }

    /// Share of ratings with the given score, from 0.0 to 1.0.
    #[must_use]
    pub fn share_for(&self, score: Score) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            f64::from(self.count_for(score)) / f64::from(self.count)
        }
    }

    /// Average rounded to one decimal for display, e.g. `4.3`.
    #[must_use]
    pub fn display_average(&self) -> String {
        self.average
            .map_or_else(|| "no ratings".to_string(), |avg| format!("{avg:.1}"))
    }
}

/// Normalize review text: trim, drop when blank, enforce a length limit.
///
/// # Errors
///
/// Returns a validation error when the trimmed review is longer than
/// `max_len` characters.
pub fn normalize_review(review: Option<&str>, max_len: usize) -> Result<Option<String>> {
    let Some(review) = review.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if review.chars().count() > max_len {
        return Err(Error::validation(
            "review",
            format!("must be at most {max_len} characters"),
        ));
    }
    Ok(Some(review.to_string()))
}
