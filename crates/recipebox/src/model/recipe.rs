//! Recipes, recipe drafts and edits.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::Category;
use super::steps::StepList;
use crate::error::{Error, Result};

/// Longest accepted title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// Longest accepted description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2_000;

/// Longest accepted single ingredient or instruction, in characters.
pub const MAX_STEP_LEN: usize = 1_000;

/// Most ingredients or instructions a recipe may have.
pub const MAX_STEPS: usize = 100;

/// Upper bound for prep and cook times (one week).
pub const MAX_MINUTES: u32 = 7 * 24 * 60;

/// Upper bound for servings.
pub const MAX_SERVINGS: u32 = 1_000;

/// How hard a recipe is to make.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Beginner friendly.
    #[default]
    Easy,
    /// Some experience needed.
    Medium,
    /// Advanced technique or long preparation.
    Hard,
}

impl Difficulty {
    /// All difficulties, easiest first.
    pub const ALL: [Self; 3] = [Self::Easy, Self::Medium, Self::Hard];

    /// The lower-case storage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(Error::validation(
                "difficulty",
                format!("unknown difficulty '{other}' (expected easy, medium or hard)"),
            )),
        }
    }
}

/// A stored recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Identifier assigned by storage.
    pub id: i64,
    /// Profile id of the author.
    pub author_id: String,
    /// Recipe title.
    pub title: String,
    /// Optional short description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ingredients, in order.
    pub ingredients: Vec<String>,
    /// Instructions, in order.
    pub instructions: Vec<String>,
    /// Preparation time in minutes.
    pub prep_minutes: u32,
    /// Cooking time in minutes.
    pub cook_minutes: u32,
    /// Number of servings.
    pub servings: u32,
    /// Difficulty level.
    pub difficulty: Difficulty,
    /// Image key in the image store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Category the recipe is tagged with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    /// When the recipe was created.
    pub created_at: DateTime<Utc>,
    /// When the recipe was last edited.
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// Prep plus cook time.
    #[must_use]
    pub fn total_minutes(&self) -> u32 {
        self.prep_minutes.saturating_add(self.cook_minutes)
    }

    /// Whether `user_id` wrote this recipe.
    #[must_use]
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author_id == user_id
    }

    /// Start an edit from the current values.
    #[must_use]
    pub fn to_draft(&self) -> NewRecipe {
        NewRecipe {
            title: self.title.clone(),
            description: self.description.clone(),
            ingredients: self.ingredients.clone().into(),
            instructions: self.instructions.clone().into(),
            prep_minutes: self.prep_minutes,
            cook_minutes: self.cook_minutes,
            servings: self.servings,
            difficulty: self.difficulty,
            image: self.image.clone(),
            category_id: self.category_id,
        }
    }
}

/// The editable fields of a recipe, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewRecipe {
    /// Recipe title.
    pub title: String,
    /// Optional short description.
    pub description: Option<String>,
    /// Ingredients, in order.
    pub ingredients: StepList,
    /// Instructions, in order.
    pub instructions: StepList,
    /// Preparation time in minutes.
    pub prep_minutes: u32,
    /// Cooking time in minutes.
    pub cook_minutes: u32,
    /// Number of servings.
    pub servings: u32,
    /// Difficulty level.
    pub difficulty: Difficulty,
    /// Image key in the image store.
    pub image: Option<String>,
    /// Category id.
    pub category_id: Option<i64>,
}

impl Default for NewRecipe {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: None,
            ingredients: StepList::new(),
            instructions: StepList::new(),
            prep_minutes: 0,
            cook_minutes: 0,
            servings: 4,
            difficulty: Difficulty::Easy,
            image: None,
            category_id: None,
        }
    }
}

impl NewRecipe {
    /// Create a draft with the given title and default metadata.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Normalize and validate the draft.
    ///
    /// Trims the title and description (a blank description becomes `None`)
    /// and drops blank ingredient and instruction rows.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first offending field.
    pub fn validated(self) -> Result<Self> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::validation("title", "must not be empty"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::validation(
                "title",
                format!("must be at most {MAX_TITLE_LEN} characters"),
            ));
        }

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if description
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN)
        {
            return Err(Error::validation(
                "description",
                format!("must be at most {MAX_DESCRIPTION_LEN} characters"),
            ));
        }

        let ingredients = validate_steps("ingredients", &self.ingredients)?;
        let instructions = validate_steps("instructions", &self.instructions)?;

        if self.prep_minutes > MAX_MINUTES {
            return Err(Error::validation(
                "prep_minutes",
                format!("must be at most {MAX_MINUTES}"),
            ));
        }
        if self.cook_minutes > MAX_MINUTES {
            return Err(Error::validation(
                "cook_minutes",
                format!("must be at most {MAX_MINUTES}"),
            ));
        }
        if self.servings == 0 || self.servings > MAX_SERVINGS {
            return Err(Error::validation(
                "servings",
                format!("must be between 1 and {MAX_SERVINGS}"),
            ));
        }

        Ok(Self {
            title,
            description,
            ingredients,
            instructions,
            ..self
        })
    }

    /// Prep plus cook time.
    #[must_use]
    pub fn total_minutes(&self) -> u32 {
        self.prep_minutes.saturating_add(self.cook_minutes)
    }
}

fn validate_steps(field: &'static str, steps: &StepList) -> Result<StepList> {
    let steps = steps.normalized();
    if steps.is_empty() {
        return Err(Error::validation(field, "at least one entry is required"));
    }
    if steps.len() > MAX_STEPS {
        return Err(Error::validation(
            field,
            format!("at most {MAX_STEPS} entries are allowed"),
        ));
    }
    if let Some(pos) = steps.iter().position(|s| s.chars().count() > MAX_STEP_LEN) {
        return Err(Error::validation(
            field,
            format!("entry {} is longer than {MAX_STEP_LEN} characters", pos + 1),
        ));
    }
    Ok(steps)
}

/// A partial edit of a recipe. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeChanges {
    /// New title.
    pub title: Option<String>,
    /// New description; a blank string clears it.
    pub description: Option<String>,
    /// Replacement ingredient list.
    pub ingredients: Option<StepList>,
    /// Replacement instruction list.
    pub instructions: Option<StepList>,
    /// New preparation time.
    pub prep_minutes: Option<u32>,
    /// New cooking time.
    pub cook_minutes: Option<u32>,
    /// New servings.
    pub servings: Option<u32>,
    /// New difficulty.
    pub difficulty: Option<Difficulty>,
    /// New image key; `Some(None)` removes the image. In JSON an absent
    /// field keeps the image and `null` removes it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub image: Option<Option<String>>,
    /// New category; `Some(None)` removes the category. In JSON an absent
    /// field keeps the category and `null` removes it.
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<i64>>,
}

/// Deserialize a field that is present, possibly as `null`. Absent fields
/// fall back to the container default.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl RecipeChanges {
    /// Whether the edit changes anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the edit on top of `recipe`, returning the validated result.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the edited recipe is invalid.
    pub fn apply_to(&self, recipe: &Recipe) -> Result<NewRecipe> {
        let mut draft = recipe.to_draft();

        if let Some(title) = &self.title {
            draft.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            draft.description = Some(description.clone());
        }
        if let Some(ingredients) = &self.ingredients {
            draft.ingredients = ingredients.clone();
        }
        if let Some(instructions) = &self.instructions {
            draft.instructions = instructions.clone();
        }
        if let Some(prep) = self.prep_minutes {
            draft.prep_minutes = prep;
        }
        if let Some(cook) = self.cook_minutes {
            draft.cook_minutes = cook;
        }
        if let Some(servings) = self.servings {
            draft.servings = servings;
        }
        if let Some(difficulty) = self.difficulty {
            draft.difficulty = difficulty;
        }
        if let Some(image) = &self.image {
            draft.image.clone_from(image);
        }
        if let Some(category_id) = self.category_id {
            draft.category_id = category_id;
        }

        draft.validated()
    }
}

/// A recipe as shown in the community feed, with its aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeCard {
    /// The recipe itself.
    pub recipe: Recipe,
    /// Username of the author.
    pub author: String,
    /// The recipe's category, if tagged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Average score, if the recipe has ratings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
    /// Number of ratings.
    pub rating_count: u32,
    /// Number of users who favorited the recipe.
    pub favorite_count: u32,
}
