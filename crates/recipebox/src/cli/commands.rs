//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::feed::FeedSort;
use crate::model::Difficulty;

/// Sign up command arguments.
#[derive(Debug, Args)]
pub struct SignupCommand {
    /// Email address used to sign in
    pub email: String,

    /// Public username (3-30 letters, digits or underscores)
    pub username: String,

    /// Name shown instead of the username
    #[arg(short, long)]
    pub display_name: Option<String>,

    /// Password (read from standard input when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

/// Login command arguments.
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Email address
    pub email: String,

    /// Password (read from standard input when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

/// Password change arguments.
#[derive(Debug, Args)]
pub struct PasswordCommand {
    /// Current password
    #[arg(long)]
    pub current: String,

    /// New password
    #[arg(long)]
    pub new: String,
}

/// Profile commands.
#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show a profile (your own by default)
    Show {
        /// Username to look up
        username: Option<String>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Edit your profile
    Edit(ProfileEditCommand),
}

/// Profile edit arguments.
#[derive(Debug, Args)]
pub struct ProfileEditCommand {
    /// New username
    #[arg(short, long)]
    pub username: Option<String>,

    /// New display name (empty to clear)
    #[arg(short, long)]
    pub display_name: Option<String>,

    /// New bio (empty to clear)
    #[arg(short, long)]
    pub bio: Option<String>,

    /// Image file to use as avatar
    #[arg(short, long, value_name = "FILE", conflicts_with = "remove_avatar")]
    pub avatar: Option<PathBuf>,

    /// Remove the current avatar
    #[arg(long)]
    pub remove_avatar: bool,
}

/// Recipe commands.
#[derive(Debug, Subcommand)]
pub enum RecipeCommand {
    /// Publish a new recipe
    Add(RecipeAddCommand),

    /// Show a recipe
    Show {
        /// Recipe id
        id: i64,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Edit one of your recipes
    Edit(RecipeEditCommand),

    /// Delete one of your recipes
    Delete {
        /// Recipe id
        id: i64,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List your recipes
    Mine {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Recipe creation arguments.
#[derive(Debug, Args)]
pub struct RecipeAddCommand {
    /// Recipe title
    #[arg(required_unless_present = "from_file")]
    pub title: Option<String>,

    /// Read the whole recipe from a JSON file
    #[arg(long, value_name = "FILE", conflicts_with = "title")]
    pub from_file: Option<PathBuf>,

    /// Short description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Ingredient (repeat for each one, in order)
    #[arg(short, long = "ingredient", value_name = "TEXT")]
    pub ingredients: Vec<String>,

    /// Instruction step (repeat for each one, in order)
    #[arg(short, long = "step", value_name = "TEXT")]
    pub steps: Vec<String>,

    /// Preparation time in minutes
    #[arg(long, default_value = "0")]
    pub prep: u32,

    /// Cooking time in minutes
    #[arg(long, default_value = "0")]
    pub cook: u32,

    /// Number of servings
    #[arg(long, default_value = "4")]
    pub servings: u32,

    /// Difficulty level
    #[arg(long, value_enum, default_value = "easy")]
    pub difficulty: DifficultyArg,

    /// Category name
    #[arg(long)]
    pub category: Option<String>,

    /// Photo of the dish
    #[arg(long, value_name = "FILE")]
    pub image: Option<PathBuf>,
}

/// Recipe edit arguments.
///
/// Positions are 1-based, as shown by `recipe show`.
#[derive(Debug, Args)]
pub struct RecipeEditCommand {
    /// Recipe id
    pub id: i64,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New description (empty to clear)
    #[arg(long)]
    pub description: Option<String>,

    /// Append an ingredient
    #[arg(long, value_name = "TEXT")]
    pub add_ingredient: Vec<String>,

    /// Remove the ingredient at a position
    #[arg(long, value_name = "N")]
    pub remove_ingredient: Vec<usize>,

    /// Append an instruction step
    #[arg(long, value_name = "TEXT")]
    pub add_step: Vec<String>,

    /// Insert a step before a position, as N=TEXT
    #[arg(long, value_name = "N=TEXT")]
    pub insert_step: Vec<String>,

    /// Replace the step at a position, as N=TEXT
    #[arg(long, value_name = "N=TEXT")]
    pub replace_step: Vec<String>,

    /// Remove the step at a position
    #[arg(long, value_name = "N")]
    pub remove_step: Vec<usize>,

    /// Move the step at a position one up
    #[arg(long, value_name = "N")]
    pub step_up: Option<usize>,

    /// Move the step at a position one down
    #[arg(long, value_name = "N")]
    pub step_down: Option<usize>,

    /// New preparation time in minutes
    #[arg(long)]
    pub prep: Option<u32>,

    /// New cooking time in minutes
    #[arg(long)]
    pub cook: Option<u32>,

    /// New number of servings
    #[arg(long)]
    pub servings: Option<u32>,

    /// New difficulty
    #[arg(long, value_enum)]
    pub difficulty: Option<DifficultyArg>,

    /// New category name
    #[arg(long, conflicts_with = "no_category")]
    pub category: Option<String>,

    /// Remove the category
    #[arg(long)]
    pub no_category: bool,

    /// New photo
    #[arg(long, value_name = "FILE", conflicts_with = "no_image")]
    pub image: Option<PathBuf>,

    /// Remove the photo
    #[arg(long)]
    pub no_image: bool,
}

/// Feed command arguments.
#[derive(Debug, Args)]
pub struct FeedCommand {
    /// Search text (title, description and ingredients)
    pub search: Option<String>,

    /// Filter by category name
    #[arg(long)]
    pub category: Option<String>,

    /// Filter by difficulty
    #[arg(short, long, value_enum)]
    pub difficulty: Option<DifficultyArg>,

    /// Maximum total time in minutes
    #[arg(short = 't', long, value_name = "MINUTES")]
    pub max_minutes: Option<u32>,

    /// Only recipes by this username
    #[arg(short, long)]
    pub author: Option<String>,

    /// Only your favorites
    #[arg(long)]
    pub favorites: bool,

    /// Minimum average rating
    #[arg(long, value_name = "STARS")]
    pub min_rating: Option<f64>,

    /// Sort order
    #[arg(short, long, value_enum, default_value = "newest")]
    pub sort: SortArg,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Favorite commands.
#[derive(Debug, Subcommand)]
pub enum FavoriteCommand {
    /// Flip the favorite mark on a recipe
    Toggle {
        /// Recipe id
        id: i64,
    },

    /// Mark a recipe as favorite
    Add {
        /// Recipe id
        id: i64,
    },

    /// Remove a favorite mark
    Remove {
        /// Recipe id
        id: i64,
    },

    /// List your favorite recipes
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Rate command arguments.
#[derive(Debug, Args)]
pub struct RateCommand {
    /// Recipe id
    pub id: i64,

    /// Score from 1 to 5
    #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
    pub score: u8,

    /// Review text
    #[arg(short, long)]
    pub review: Option<String>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Difficulty argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DifficultyArg {
    /// Beginner friendly
    Easy,
    /// Some experience needed
    Medium,
    /// Advanced
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Self::Easy,
            DifficultyArg::Medium => Self::Medium,
            DifficultyArg::Hard => Self::Hard,
        }
    }
}

/// Feed sort argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    /// Newest first
    Newest,
    /// Oldest first
    Oldest,
    /// Best rated first
    TopRated,
    /// Shortest total time first
    Quickest,
    /// Most favorited first
    MostFavorited,
}

impl From<SortArg> for FeedSort {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Newest => Self::Newest,
            SortArg::Oldest => Self::Oldest,
            SortArg::TopRated => Self::TopRated,
            SortArg::Quickest => Self::Quickest,
            SortArg::MostFavorited => Self::MostFavorited,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

/// Split a `N=TEXT` argument into a 0-based index and the text.
///
/// # Errors
///
/// Returns a validation error if the argument is malformed or `N` is 0.
pub fn parse_positioned(arg: &str) -> crate::Result<(usize, String)> {
    let invalid = || crate::Error::validation("position", format!("expected N=TEXT, got '{arg}'"));
    let (n, text) = arg.split_once('=').ok_or_else(invalid)?;
    let n: usize = n.trim().parse().map_err(|_| invalid())?;
    let index = n.checked_sub(1).ok_or_else(invalid)?;
    Ok((index, text.to_string()))
}
