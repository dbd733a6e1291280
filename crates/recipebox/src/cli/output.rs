//! Plain-text rendering of recipes, profiles and reviews.

use std::fmt::Write as _;

use crate::model::{Category, Profile, Recipe, RecipeCard};
use crate::service::{RecipeDetails, RecipeRatings};
use crate::storage::StorageStats;

/// Longest title shown in a table row.
const TITLE_WIDTH: usize = 32;

/// Shorten `text` to at most `width` characters, marking the cut.
#[must_use]
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Average rating as shown in listings.
#[must_use]
pub fn rating_label(card: &RecipeCard) -> String {
    match card.average_rating {
        Some(avg) => format!("{avg:.1}★ ({})", card.rating_count),
        None => "unrated".to_string(),
    }
}

/// One line per recipe.
#[must_use]
pub fn card_line(card: &RecipeCard) -> String {
    let category = card
        .category
        .as_ref()
        .map(|c| format!(" {}", c.emoji))
        .unwrap_or_default();
    format!(
        "#{} {}{} by {} · {} min · {} · {} · ♥ {}",
        card.recipe.id,
        card.recipe.title,
        category,
        card.author,
        card.recipe.total_minutes(),
        card.recipe.difficulty,
        rating_label(card),
        card.favorite_count
    )
}

/// A fixed-width table of recipes.
#[must_use]
pub fn card_table(cards: &[RecipeCard]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>5}  {:<w$}  {:<16}  {:>5}  {:<6}  {:>12}  {:>4}",
        "ID",
        "TITLE",
        "AUTHOR",
        "MIN",
        "LEVEL",
        "RATING",
        "FAV",
        w = TITLE_WIDTH
    );
    for card in cards {
        let _ = writeln!(
            out,
            "{:>5}  {:<w$}  {:<16}  {:>5}  {:<6}  {:>12}  {:>4}",
            card.recipe.id,
            truncate(&card.recipe.title, TITLE_WIDTH),
            truncate(&card.author, 16),
            card.recipe.total_minutes(),
            card.recipe.difficulty.as_str(),
            rating_label(card),
            card.favorite_count,
            w = TITLE_WIDTH
        );
    }
    out
}

/// Full recipe page with numbered ingredients and steps.
#[must_use]
pub fn recipe_page(details: &RecipeDetails) -> String {
    let card = &details.card;
    let recipe = &card.recipe;
    let mut out = String::new();

    let _ = writeln!(out, "{} (#{})", recipe.title, recipe.id);
    let _ = writeln!(out, "by {}", card.author);
    if let Some(category) = &card.category {
        let _ = writeln!(out, "{category}");
    }
    if let Some(description) = &recipe.description {
        let _ = writeln!(out, "\n{description}");
    }

    let _ = writeln!(
        out,
        "\nPrep {} min · Cook {} min · Serves {} · {}",
        recipe.prep_minutes, recipe.cook_minutes, recipe.servings, recipe.difficulty
    );
    let _ = writeln!(
        out,
        "Rating: {} ({} ratings) · ♥ {}{}",
        details.summary.display_average(),
        details.summary.count,
        card.favorite_count,
        if details.favorited { " (yours)" } else { "" }
    );
    if let Some(mine) = &details.my_rating {
        let _ = writeln!(out, "Your rating: {}", mine.score.stars());
    }
    if let Some(image) = &recipe.image {
        let _ = writeln!(out, "Photo: {image}");
    }

    out.push_str("\nIngredients\n");
    for (i, ingredient) in recipe.ingredients.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {ingredient}", i + 1);
    }
    out.push_str("\nInstructions\n");
    for (i, step) in recipe.instructions.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {step}", i + 1);
    }
    out
}

/// Short list of one user's recipes.
#[must_use]
pub fn recipe_list(recipes: &[Recipe]) -> String {
    let mut out = String::new();
    for recipe in recipes {
        let _ = writeln!(
            out,
            "#{} {} · {} min · {} · {}",
            recipe.id,
            recipe.title,
            recipe.total_minutes(),
            recipe.difficulty,
            recipe.created_at.format("%Y-%m-%d")
        );
    }
    out
}

/// Rating histogram and reviews.
#[must_use]
pub fn reviews_page(ratings: &RecipeRatings) -> String {
    let summary = &ratings.summary;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Average {} from {} ratings",
        summary.display_average(),
        summary.count
    );

    for stars in (1..=5u8).rev() {
        let count = summary.histogram[usize::from(stars - 1)];
        let bar_len = if summary.count == 0 {
            0
        } else {
            (count * 20).div_ceil(summary.count)
        };
        let bar = "█".repeat(usize::try_from(bar_len).unwrap_or(0));
        let _ = writeln!(out, "  {stars}★ {bar:<20} {count}");
    }

    for review in &ratings.reviews {
        let _ = write!(
            out,
            "\n{} {} · {}",
            review.rating.score.stars(),
            review.reviewer,
            review.rating.updated_at.format("%Y-%m-%d")
        );
        if let Some(text) = &review.rating.review {
            let _ = write!(out, "\n  {text}");
        }
        out.push('\n');
    }
    out
}

/// Profile summary.
#[must_use]
pub fn profile_page(profile: &Profile, recipe_count: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (@{})", profile.name(), profile.username);
    if let Some(bio) = &profile.bio {
        let _ = writeln!(out, "{bio}");
    }
    if let Some(avatar) = &profile.avatar {
        let _ = writeln!(out, "Avatar: {avatar}");
    }
    let _ = writeln!(out, "Recipes: {recipe_count}");
    let _ = writeln!(out, "Joined:  {}", profile.created_at.format("%Y-%m-%d"));
    out
}

/// The category taxonomy.
#[must_use]
pub fn category_list(categories: &[Category]) -> String {
    let mut out = String::new();
    for category in categories {
        let label = category.to_string();
        let _ = writeln!(out, "{label:<16} {}", category.description);
    }
    out
}

/// Database statistics.
#[must_use]
pub fn stats_page(stats: &StorageStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Users:         {}", stats.profiles);
    let _ = writeln!(out, "Recipes:       {}", stats.recipes);
    let _ = writeln!(out, "Ratings:       {}", stats.ratings);
    let _ = writeln!(out, "Favorites:     {}", stats.favorites);
    let _ = writeln!(out, "Sessions:      {}", stats.sessions);
    if let Some(newest) = stats.newest_recipe {
        let _ = writeln!(out, "Newest recipe: {}", newest.format("%Y-%m-%d %H:%M"));
    }
    let _ = writeln!(out, "Database size: {} KiB", stats.db_size_bytes / 1024);
    out
}
