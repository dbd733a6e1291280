//! `recipebox` - A community recipe box
//!
//! This library provides the core functionality for publishing recipes,
//! browsing the community feed, keeping favorites and rating recipes, backed
//! by a local `SQLite` database and a content-addressed image store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod images;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;

pub use auth::SignUp;
pub use config::Config;
pub use error::{Error, Result};
pub use feed::{FeedQuery, FeedSort};
pub use images::ImageStore;
pub use logging::init_logging;
pub use model::{
    Category, Difficulty, NewRecipe, Profile, ProfileChanges, Rating, RatingSummary, Recipe,
    RecipeCard, RecipeChanges, Session, StepList,
};
pub use service::{FeedPage, ImageChange, RecipeBox, RecipeDetails, RecipeRatings};
pub use storage::{Storage, StorageStats};
