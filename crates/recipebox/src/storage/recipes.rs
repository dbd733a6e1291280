//! Recipe queries and the community feed.

use chrono::Utc;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::debug;

use super::{conversion_error, format_time, sql_count, time_column, Storage};
use crate::error::Result;
use crate::feed::{FeedQuery, FeedSort};
use crate::model::{Category, Difficulty, NewRecipe, Recipe, RecipeCard};

const RECIPE_COLUMNS: &str = r"
    r.id, r.author_id, r.title, r.description, r.ingredients, r.instructions,
    r.prep_minutes, r.cook_minutes, r.servings, r.difficulty, r.image, r.category_id,
    r.created_at, r.updated_at";

/// Joins shared by the feed and its count. Aggregates are pre-grouped so
/// that a recipe appears once regardless of how many ratings it has.
const CARD_FROM: &str = r"
    FROM recipes r
    JOIN profiles p ON p.id = r.author_id
    LEFT JOIN categories c ON c.id = r.category_id
    LEFT JOIN (
        SELECT recipe_id, AVG(score) AS avg_rating, COUNT(*) AS rating_count
        FROM recipe_ratings GROUP BY recipe_id
    ) rs ON rs.recipe_id = r.id
    LEFT JOIN (
        SELECT recipe_id, COUNT(*) AS favorite_count
        FROM recipe_favorites GROUP BY recipe_id
    ) fs ON fs.recipe_id = r.id";

const CARD_EXTRA_COLUMNS: &str = r"
    p.username, c.id, c.name, c.emoji, c.description,
    rs.avg_rating, COALESCE(rs.rating_count, 0), COALESCE(fs.favorite_count, 0)";

impl Storage {
    /// Insert a validated recipe draft and return the new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the author or category does not exist or the
    /// database operation fails.
    pub fn insert_recipe(&self, author_id: &str, recipe: &NewRecipe) -> Result<i64> {
        let now = format_time(&Utc::now());
        self.conn.execute(
            r"
            INSERT INTO recipes
                (author_id, title, description, ingredients, instructions,
                 prep_minutes, cook_minutes, servings, difficulty, image, category_id,
                 created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            ",
            params![
                author_id,
                recipe.title,
                recipe.description,
                serde_json::to_string(recipe.ingredients.as_slice())?,
                serde_json::to_string(recipe.instructions.as_slice())?,
                recipe.prep_minutes,
                recipe.cook_minutes,
                recipe.servings,
                recipe.difficulty.as_str(),
                recipe.image,
                recipe.category_id,
                now,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted recipe {} by {}", id, author_id);
        Ok(id)
    }

    /// Get a recipe by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        let recipe = self
            .conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = ?1"),
                [id],
                row_to_recipe,
            )
            .optional()?;
        Ok(recipe)
    }

    /// Replace the editable fields of a recipe and bump `updated_at`.
    ///
    /// Returns `false` if the recipe does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the category does not exist or the database
    /// operation fails.
    pub fn update_recipe(&self, id: i64, recipe: &NewRecipe) -> Result<bool> {
        let affected = self.conn.execute(
            r"
            UPDATE recipes SET
                title = ?2, description = ?3, ingredients = ?4, instructions = ?5,
                prep_minutes = ?6, cook_minutes = ?7, servings = ?8, difficulty = ?9,
                image = ?10, category_id = ?11, updated_at = ?12
            WHERE id = ?1
            ",
            params![
                id,
                recipe.title,
                recipe.description,
                serde_json::to_string(recipe.ingredients.as_slice())?,
                serde_json::to_string(recipe.instructions.as_slice())?,
                recipe.prep_minutes,
                recipe.cook_minutes,
                recipe.servings,
                recipe.difficulty.as_str(),
                recipe.image,
                recipe.category_id,
                format_time(&Utc::now()),
            ],
        )?;
        Ok(affected > 0)
    }

    /// Delete a recipe along with its ratings and favorites.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_recipe(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM recipes WHERE id = ?1", [id])?;
        if affected > 0 {
            debug!("Deleted recipe {}", id);
        }
        Ok(affected > 0)
    }

    /// All recipes by one author, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recipes_by_author(&self, author_id: &str) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r \
             WHERE r.author_id = ?1 ORDER BY r.created_at DESC, r.id DESC"
        ))?;
        let recipes = stmt
            .query_map([author_id], row_to_recipe)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    /// A single recipe with its author, category and aggregates.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recipe_card(&self, id: i64) -> Result<Option<RecipeCard>> {
        let card = self
            .conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS}, {CARD_EXTRA_COLUMNS} {CARD_FROM} WHERE r.id = ?1"),
                [id],
                row_to_card,
            )
            .optional()?;
        Ok(card)
    }

    /// Run a feed query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn feed(&self, query: &FeedQuery) -> Result<Vec<RecipeCard>> {
        let (filter, mut values) = feed_filter(query);
        values.push(Value::Integer(sql_count(query.limit)));
        values.push(Value::Integer(sql_count(query.offset)));

        let sql = format!(
            "SELECT {RECIPE_COLUMNS}, {CARD_EXTRA_COLUMNS} {CARD_FROM} {filter} \
             ORDER BY {} LIMIT ? OFFSET ?",
            order_by(query.sort)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let cards = stmt
            .query_map(params_from_iter(values.iter()), row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Feed query returned {} recipes", cards.len());
        Ok(cards)
    }

    /// Count the recipes matching a feed query, ignoring its page window.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_recipes(&self, query: &FeedQuery) -> Result<u64> {
        let (filter, values) = feed_filter(query);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) {CARD_FROM} {filter}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// Build the `WHERE` clause and its positional values for a feed query.
fn feed_filter(query: &FeedQuery) -> (String, Vec<Value>) {
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(pattern) = query.search_pattern() {
        conditions.push(
            r"(casefold(r.title) LIKE ? ESCAPE '\'
              OR casefold(r.description) LIKE ? ESCAPE '\'
              OR EXISTS (SELECT 1 FROM json_each(r.ingredients) i
                         WHERE casefold(i.value) LIKE ? ESCAPE '\'))",
        );
        for _ in 0..3 {
            values.push(Value::Text(pattern.clone()));
        }
    }
    if let Some(category_id) = query.category_id {
        conditions.push("r.category_id = ?");
        values.push(Value::Integer(category_id));
    }
    if let Some(difficulty) = query.difficulty {
        conditions.push("r.difficulty = ?");
        values.push(Value::Text(difficulty.as_str().to_string()));
    }
    if let Some(minutes) = query.max_total_minutes {
        conditions.push("(r.prep_minutes + r.cook_minutes) <= ?");
        values.push(Value::Integer(i64::from(minutes)));
    }
    if let Some(author_id) = &query.author_id {
        conditions.push("r.author_id = ?");
        values.push(Value::Text(author_id.clone()));
    }
    if let Some(user_id) = &query.favorited_by {
        conditions.push(
            "EXISTS (SELECT 1 FROM recipe_favorites f WHERE f.recipe_id = r.id AND f.user_id = ?)",
        );
        values.push(Value::Text(user_id.clone()));
    }
    if let Some(rating) = query.min_rating {
        conditions.push("rs.avg_rating >= ?");
        values.push(Value::Real(rating));
    }

    let filter = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (filter, values)
}

fn order_by(sort: FeedSort) -> &'static str {
    match sort {
        FeedSort::Newest => "r.created_at DESC, r.id DESC",
        FeedSort::Oldest => "r.created_at ASC, r.id ASC",
        FeedSort::TopRated => {
            "rs.avg_rating IS NULL, rs.avg_rating DESC, COALESCE(rs.rating_count, 0) DESC, r.id DESC"
        }
        FeedSort::Quickest => "(r.prep_minutes + r.cook_minutes) ASC, r.id DESC",
        FeedSort::MostFavorited => "COALESCE(fs.favorite_count, 0) DESC, r.id DESC",
    }
}

fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, Type::Text, e.to_string()))
}

fn row_to_recipe(row: &Row<'_>) -> rusqlite::Result<Recipe> {
    let difficulty: String = row.get(9)?;
    let difficulty = difficulty
        .parse::<Difficulty>()
        .map_err(|e| conversion_error(9, Type::Text, e.to_string()))?;

    Ok(Recipe {
        id: row.get(0)?,
        author_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        ingredients: json_list(row, 4)?,
        instructions: json_list(row, 5)?,
        prep_minutes: row.get(6)?,
        cook_minutes: row.get(7)?,
        servings: row.get(8)?,
        difficulty,
        image: row.get(10)?,
        category_id: row.get(11)?,
        created_at: time_column(row, 12)?,
        updated_at: time_column(row, 13)?,
    })
}

fn row_to_card(row: &Row<'_>) -> rusqlite::Result<RecipeCard> {
    let category_id: Option<i64> = row.get(15)?;
    let category = match category_id {
        Some(id) => Some(Category {
            id,
            name: row.get(16)?,
            emoji: row.get(17)?,
            description: row.get(18)?,
        }),
        None => None,
    };

    Ok(RecipeCard {
        recipe: row_to_recipe(row)?,
        author: row.get(14)?,
        category,
        average_rating: row.get(19)?,
        rating_count: row.get(20)?,
        favorite_count: row.get(21)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::model::{Profile, Rating, Score};

    fn rate(storage: &Storage, recipe_id: i64, user: &Profile, score: u8) {
        let now = Utc::now();
        storage
            .upsert_rating(&Rating {
                recipe_id,
                user_id: user.id.clone(),
                score: Score::new(score).unwrap(),
                review: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
    }

    fn titles(cards: &[RecipeCard]) -> Vec<&str> {
        cards.iter().map(|c| c.recipe.title.as_str()).collect()
    }

    #[test]
    fn test_insert_and_get() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let id = create_recipe(&storage, &author, "Bread");

        let recipe = storage.get_recipe(id).unwrap().unwrap();
        assert_eq!(recipe.title, "Bread");
        assert_eq!(recipe.author_id, author.id);
        assert_eq!(recipe.ingredients, ["1 cup flour", "2 eggs"]);
        assert_eq!(recipe.instructions, ["Mix", "Bake"]);
        assert_eq!(recipe.total_minutes(), 30);
        assert_eq!(recipe.difficulty, Difficulty::Easy);
        assert_eq!(recipe.created_at, recipe.updated_at);
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.get_recipe(999).unwrap().is_none());
        assert!(storage.recipe_card(999).unwrap().is_none());
    }

    #[test]
    fn test_insert_with_unknown_category_fails() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let recipe = NewRecipe {
            category_id: Some(999),
            ..draft("Bread")
        };
        assert!(storage.insert_recipe(&author.id, &recipe).is_err());
    }

    #[test]
    fn test_update() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let id = create_recipe(&storage, &author, "Bread");

        let mut edited = storage.get_recipe(id).unwrap().unwrap().to_draft();
        edited.title = "Rye Bread".to_string();
        edited.difficulty = Difficulty::Hard;
        edited.ingredients.push("caraway");
        assert!(storage.update_recipe(id, &edited).unwrap());

        let recipe = storage.get_recipe(id).unwrap().unwrap();
        assert_eq!(recipe.title, "Rye Bread");
        assert_eq!(recipe.difficulty, Difficulty::Hard);
        assert_eq!(recipe.ingredients.len(), 3);
        assert!(recipe.updated_at >= recipe.created_at);

        assert!(!storage.update_recipe(999, &edited).unwrap());
    }

    #[test]
    fn test_delete_cascades_ratings() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let fan = create_profile(&storage, "fan");
        let id = create_recipe(&storage, &author, "Bread");
        rate(&storage, id, &fan, 5);

        assert!(storage.delete_recipe(id).unwrap());
        assert!(storage.get_rating(id, &fan.id).unwrap().is_none());
        assert!(!storage.delete_recipe(id).unwrap());
    }

    #[test]
    fn test_recipes_by_author() {
        let storage = create_test_storage();
        let baker = create_profile(&storage, "baker");
        let cook = create_profile(&storage, "cook");
        create_recipe(&storage, &baker, "Bread");
        create_recipe(&storage, &baker, "Cake");
        create_recipe(&storage, &cook, "Soup");

        let recipes = storage.recipes_by_author(&baker.id).unwrap();
        let titles: Vec<_> = recipes.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["Cake", "Bread"]);
    }

    #[test]
    fn test_recipe_card_aggregates() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let alice = create_profile(&storage, "alice");
        let bob = create_profile(&storage, "bob");
        let dessert = storage.get_category_by_name("Dessert").unwrap().unwrap();

        let recipe = NewRecipe {
            category_id: Some(dessert.id),
            ..draft("Cake")
        };
        let id = storage.insert_recipe(&author.id, &recipe).unwrap();
        rate(&storage, id, &alice, 5);
        rate(&storage, id, &bob, 4);
        storage.add_favorite(id, &alice.id).unwrap();

        let card = storage.recipe_card(id).unwrap().unwrap();
        assert_eq!(card.author, "baker");
        assert_eq!(card.category.as_ref().map(|c| c.name.as_str()), Some("Dessert"));
        assert_eq!(card.rating_count, 2);
        assert_eq!(card.favorite_count, 1);
        assert!((card.average_rating.unwrap() - 4.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_feed_newest_and_oldest() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        for title in ["First", "Second", "Third"] {
            create_recipe(&storage, &author, title);
        }

        let newest = storage.feed(&FeedQuery::new()).unwrap();
        assert_eq!(titles(&newest), ["Third", "Second", "First"]);
        assert!(newest.iter().all(|c| c.average_rating.is_none()));

        let oldest = storage
            .feed(&FeedQuery::new().sort(FeedSort::Oldest))
            .unwrap();
        assert_eq!(titles(&oldest), ["First", "Second", "Third"]);
    }

    #[test]
    fn test_feed_search() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        create_recipe(&storage, &author, "Tomato Soup");
        let salad = NewRecipe {
            ingredients: ["cherry tomatoes", "basil"].into_iter().collect(),
            ..draft("Summer Salad")
        };
        storage.insert_recipe(&author.id, &salad).unwrap();
        create_recipe(&storage, &author, "Pancakes");

        let results = storage.feed(&FeedQuery::new().search("TOMATO")).unwrap();
        assert_eq!(titles(&results), ["Summer Salad", "Tomato Soup"]);

        let literal = storage.feed(&FeedQuery::new().search("%")).unwrap();
        assert!(literal.is_empty());
    }

    #[test]
    fn test_feed_search_matches_ingredient_text_only() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        create_recipe(&storage, &author, "Bread");
        let cake = NewRecipe {
            ingredients: ["8\" cake pan", "3 eggs"].into_iter().collect(),
            ..draft("Sponge")
        };
        storage.insert_recipe(&author.id, &cake).unwrap();

        for punctuation in ["\",\"", "[", "]"] {
            let results = storage
                .feed(&FeedQuery::new().search(punctuation))
                .unwrap();
            assert!(results.is_empty(), "{punctuation} matched {:?}", titles(&results));
        }

        let results = storage.feed(&FeedQuery::new().search("8\" cake")).unwrap();
        assert_eq!(titles(&results), ["Sponge"]);
        assert_eq!(
            storage
                .count_recipes(&FeedQuery::new().search("8\" CAKE"))
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_feed_search_folds_unicode_case() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        create_recipe(&storage, &author, "Crème brûlée");
        let stew = NewRecipe {
            description: Some("ÄPFEL und Zwiebeln".to_string()),
            ingredients: ["Ørred fillets", "salt"].into_iter().collect(),
            ..draft("Fischeintopf")
        };
        storage.insert_recipe(&author.id, &stew).unwrap();

        let results = storage.feed(&FeedQuery::new().search("CRÈME")).unwrap();
        assert_eq!(titles(&results), ["Crème brûlée"]);

        let results = storage.feed(&FeedQuery::new().search("BRÛLÉE")).unwrap();
        assert_eq!(titles(&results), ["Crème brûlée"]);

        let results = storage.feed(&FeedQuery::new().search("äpfel")).unwrap();
        assert_eq!(titles(&results), ["Fischeintopf"]);

        let results = storage.feed(&FeedQuery::new().search("ørred")).unwrap();
        assert_eq!(titles(&results), ["Fischeintopf"]);
    }

    #[test]
    fn test_feed_filters_combine() {
        let storage = create_test_storage();
        let baker = create_profile(&storage, "baker");
        let cook = create_profile(&storage, "cook");
        let vegan = storage.get_category_by_name("Vegan").unwrap().unwrap();

        let quick_vegan = NewRecipe {
            category_id: Some(vegan.id),
            prep_minutes: 5,
            cook_minutes: 5,
            ..draft("Quick Bowl")
        };
        let slow_vegan = NewRecipe {
            category_id: Some(vegan.id),
            prep_minutes: 60,
            cook_minutes: 60,
            difficulty: Difficulty::Hard,
            ..draft("Slow Stew")
        };
        storage.insert_recipe(&baker.id, &quick_vegan).unwrap();
        storage.insert_recipe(&cook.id, &slow_vegan).unwrap();
        create_recipe(&storage, &baker, "Bread");

        let in_category = FeedQuery::new().category(vegan.id);
        assert_eq!(storage.feed(&in_category).unwrap().len(), 2);
        assert_eq!(storage.count_recipes(&in_category).unwrap(), 2);

        let quick = in_category.clone().max_total_minutes(30);
        assert_eq!(titles(&storage.feed(&quick).unwrap()), ["Quick Bowl"]);

        let hard = FeedQuery::new().difficulty(Difficulty::Hard);
        assert_eq!(titles(&storage.feed(&hard).unwrap()), ["Slow Stew"]);

        let by_baker = in_category.author(baker.id.clone());
        assert_eq!(titles(&storage.feed(&by_baker).unwrap()), ["Quick Bowl"]);
    }

    #[test]
    fn test_feed_favorited_by() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let fan = create_profile(&storage, "fan");
        let bread = create_recipe(&storage, &author, "Bread");
        create_recipe(&storage, &author, "Cake");
        storage.add_favorite(bread, &fan.id).unwrap();

        let query = FeedQuery::new().favorited_by(fan.id.clone());
        assert_eq!(titles(&storage.feed(&query).unwrap()), ["Bread"]);
    }

    #[test]
    fn test_feed_top_rated_puts_unrated_last() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let alice = create_profile(&storage, "alice");
        let bob = create_profile(&storage, "bob");

        let okay = create_recipe(&storage, &author, "Okay");
        create_recipe(&storage, &author, "Unrated");
        let great = create_recipe(&storage, &author, "Great");
        rate(&storage, okay, &alice, 3);
        rate(&storage, great, &alice, 5);
        rate(&storage, great, &bob, 4);

        let query = FeedQuery::new().sort(FeedSort::TopRated);
        assert_eq!(
            titles(&storage.feed(&query).unwrap()),
            ["Great", "Okay", "Unrated"]
        );

        let rated = FeedQuery::new().min_rating(4.0);
        assert_eq!(titles(&storage.feed(&rated).unwrap()), ["Great"]);
    }

    #[test]
    fn test_feed_quickest_and_most_favorited() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let fan = create_profile(&storage, "fan");

        let slow = NewRecipe {
            prep_minutes: 90,
            ..draft("Slow")
        };
        let slow = storage.insert_recipe(&author.id, &slow).unwrap();
        create_recipe(&storage, &author, "Fast");
        storage.add_favorite(slow, &fan.id).unwrap();

        let quickest = FeedQuery::new().sort(FeedSort::Quickest);
        assert_eq!(titles(&storage.feed(&quickest).unwrap()), ["Fast", "Slow"]);

        let popular = FeedQuery::new().sort(FeedSort::MostFavorited);
        assert_eq!(titles(&storage.feed(&popular).unwrap()), ["Slow", "Fast"]);
    }

    #[test]
    fn test_feed_pagination() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        for i in 0..5 {
            create_recipe(&storage, &author, &format!("Recipe {i}"));
        }

        let page = storage.feed(&FeedQuery::new().page(2, 1)).unwrap();
        assert_eq!(titles(&page), ["Recipe 3", "Recipe 2"]);

        let past_end = storage.feed(&FeedQuery::new().page(10, 10)).unwrap();
        assert!(past_end.is_empty());
        assert_eq!(storage.count_recipes(&FeedQuery::new().page(1, 0)).unwrap(), 5);
    }
}
