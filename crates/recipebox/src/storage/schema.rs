//! `SQLite` schema definitions for recipebox.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the profiles table.
///
/// Credentials live beside the profile; `password_hash` is never selected
/// by profile queries.
pub const CREATE_PROFILES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    username TEXT NOT NULL UNIQUE COLLATE NOCASE,
    display_name TEXT,
    bio TEXT,
    avatar TEXT,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the sessions table.
pub const CREATE_SESSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
)
";

/// SQL statement to create the categories table.
pub const CREATE_CATEGORIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    emoji TEXT NOT NULL,
    description TEXT NOT NULL
)
";

/// SQL statement to create the recipes table.
///
/// Ingredients and instructions are stored as JSON arrays of strings.
pub const CREATE_RECIPES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS recipes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    author_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    ingredients TEXT NOT NULL,
    instructions TEXT NOT NULL,
    prep_minutes INTEGER NOT NULL CHECK (prep_minutes >= 0),
    cook_minutes INTEGER NOT NULL CHECK (cook_minutes >= 0),
    servings INTEGER NOT NULL CHECK (servings >= 1),
    difficulty TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard')),
    image TEXT,
    category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the ratings table.
pub const CREATE_RATINGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS recipe_ratings (
    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    score INTEGER NOT NULL CHECK (score BETWEEN 1 AND 5),
    review TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (recipe_id, user_id)
)
";

/// SQL statement to create the favorites table.
pub const CREATE_FAVORITES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS recipe_favorites (
    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    user_id TEXT NOT NULL REFERENCES profiles(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (recipe_id, user_id)
)
";

/// Index for listing an author's recipes.
pub const CREATE_RECIPES_AUTHOR_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_recipes_author ON recipes(author_id)
";

/// Index for the default feed order.
pub const CREATE_RECIPES_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_recipes_created ON recipes(created_at DESC)
";

/// Index for category filtering.
pub const CREATE_RECIPES_CATEGORY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_recipes_category ON recipes(category_id)
";

/// Index for a user's ratings.
pub const CREATE_RATINGS_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_ratings_user ON recipe_ratings(user_id)
";

/// Index for a user's favorites.
pub const CREATE_FAVORITES_USER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_favorites_user ON recipe_favorites(user_id)
";

/// Index for session lookup by user and expiry pruning.
pub const CREATE_SESSIONS_EXPIRY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_PROFILES_TABLE,
    CREATE_SESSIONS_TABLE,
    CREATE_CATEGORIES_TABLE,
    CREATE_RECIPES_TABLE,
    CREATE_RATINGS_TABLE,
    CREATE_FAVORITES_TABLE,
    CREATE_RECIPES_AUTHOR_INDEX,
    CREATE_RECIPES_CREATED_INDEX,
    CREATE_RECIPES_CATEGORY_INDEX,
    CREATE_RATINGS_USER_INDEX,
    CREATE_FAVORITES_USER_INDEX,
    CREATE_SESSIONS_EXPIRY_INDEX,
    CREATE_METADATA_TABLE,
];

/// The category taxonomy seeded by the first migration: name, emoji,
/// description.
pub const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("Breakfast", "🍳", "Morning meals to start the day"),
    ("Lunch", "🥪", "Midday meals, light and hearty"),
    ("Dinner", "🍽️", "Evening mains for the family table"),
    ("Dessert", "🍰", "Cakes, cookies and sweet treats"),
    ("Snacks", "🍿", "Small bites between meals"),
    ("Vegetarian", "🥗", "Meat-free dishes"),
    ("Vegan", "🌱", "Entirely plant-based recipes"),
    ("Drinks", "🥤", "Smoothies, cocktails and hot drinks"),
];
