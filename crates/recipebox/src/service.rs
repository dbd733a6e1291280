//! The recipe community application.
//!
//! [`RecipeBox`] owns the database, the image store and the configuration
//! and exposes every user-facing operation. Anything that changes data
//! takes the caller's [`Session`]; ownership rules are checked here.

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::auth::{self, Accounts, SignUp};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feed::FeedQuery;
use crate::images::ImageStore;
use crate::model::{
    normalize_review, Category, NewRecipe, Profile, ProfileChanges, Rating, RatingSummary, Recipe,
    RecipeCard, RecipeChanges, Review, Score, Session,
};
use crate::storage::{Storage, StorageStats};

/// How an edit treats an attached image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageChange {
    /// Leave the current image as it is.
    #[default]
    Keep,
    /// Detach the current image.
    Remove,
    /// Store the file at this path and attach it.
    Replace(PathBuf),
}

/// One page of the community feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    /// The recipes on this page.
    pub cards: Vec<RecipeCard>,
    /// Number of recipes matching the filters across all pages.
    pub total: u64,
    /// Page size actually used.
    pub limit: usize,
    /// Offset of the first recipe on this page.
    pub offset: usize,
}

impl FeedPage {
    /// Whether more results follow this page.
    #[must_use]
    pub fn has_more(&self) -> bool {
        let seen = u64::try_from(self.offset + self.cards.len()).unwrap_or(u64::MAX);
        seen < self.total
    }
}

/// A recipe with everything its detail page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeDetails {
    /// The recipe and its aggregates.
    pub card: RecipeCard,
    /// Rating breakdown.
    pub summary: RatingSummary,
    /// Whether the viewer has favorited the recipe.
    pub favorited: bool,
    /// The viewer's own rating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_rating: Option<Rating>,
}

/// All ratings of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeRatings {
    /// Aggregate over `reviews`.
    pub summary: RatingSummary,
    /// Individual ratings with reviewer names.
    pub reviews: Vec<Review>,
}

/// The recipe community.
#[derive(Debug)]
pub struct RecipeBox {
    config: Config,
    storage: Storage,
    images: ImageStore,
}

impl RecipeBox {
    /// Open the database and image store named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the database or
    /// image directory cannot be opened.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let storage = Storage::open(config.database_path())?;
        let images = ImageStore::from_config(&config)?;
        Ok(Self::from_parts(config, storage, images))
    }

    /// Assemble from already opened parts.
    #[must_use]
    pub fn from_parts(config: Config, storage: Storage, images: ImageStore) -> Self {
        Self {
            config,
            storage,
            images,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The image store.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    fn accounts(&self) -> Accounts<'_> {
        Accounts::new(&self.storage, &self.config.auth)
    }

    // Accounts

    /// Register and sign in.
    ///
    /// # Errors
    ///
    /// See [`Accounts::sign_up`].
    pub fn sign_up(&self, request: &SignUp) -> Result<(Profile, Session)> {
        self.accounts().sign_up(request)
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if the credentials do not match.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<(Profile, Session)> {
        self.accounts().sign_in(email, password)
    }

    /// Close a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn sign_out(&self, token: &str) -> Result<bool> {
        self.accounts().sign_out(token)
    }

    /// Resolve a stored token to a live session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] or [`Error::SessionExpired`].
    pub fn session(&self, token: &str) -> Result<Session> {
        self.accounts().resolve(token, Utc::now())
    }

    /// The profile of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] if the profile no longer exists.
    pub fn current_user(&self, session: &Session) -> Result<Profile> {
        self.storage
            .get_profile(&session.user_id)?
            .ok_or(Error::NotAuthenticated)
    }

    /// Change the signed-in user's password. Other sessions are closed.
    ///
    /// # Errors
    ///
    /// See [`Accounts::change_password`].
    pub fn change_password(&self, session: &Session, current: &str, new: &str) -> Result<Session> {
        self.accounts()
            .change_password(&session.user_id, current, new)
    }

    // Profiles

    /// Look up a profile by username.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown username.
    pub fn profile(&self, username: &str) -> Result<Profile> {
        self.storage
            .get_profile_by_username(username.trim())?
            .ok_or_else(|| Error::not_found("profile", username.trim()))
    }

    /// Edit the signed-in user's own profile.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad values, [`Error::Conflict`] for a
    /// taken username and an image error for a rejected avatar.
    pub fn update_profile(
        &self,
        session: &Session,
        changes: &ProfileChanges,
        avatar: &ImageChange,
    ) -> Result<Profile> {
        let current = self.current_user(session)?;
        let mut updated = changes.apply_to(&current)?;
        if changes.username.is_some() {
            updated.username = auth::validate_username(&updated.username)?;
        }

        let new_key =
            self.resolve_image(avatar, current.avatar.as_deref(), current.avatar.as_deref())?;
        updated.avatar.clone_from(&new_key);

        if let Err(e) = self.storage.update_profile(&updated) {
            self.release_new_image(new_key.as_deref(), current.avatar.as_deref());
            return Err(e);
        }
        if current.avatar != updated.avatar {
            self.release_image(current.avatar.as_deref());
        }

        info!("Updated profile {}", updated.username);
        self.current_user(session)
    }

    // Recipes

    /// Publish a recipe.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid draft, [`Error::NotFound`]
    /// for an unknown category and an image error for a rejected photo.
    pub fn create_recipe(
        &self,
        session: &Session,
        draft: NewRecipe,
        image: &ImageChange,
    ) -> Result<RecipeCard> {
        let mut draft = draft.validated()?;
        self.check_category(draft.category_id)?;

        let key = self.resolve_image(image, draft.image.as_deref(), None)?;
        draft.image.clone_from(&key);

        let id = match self.storage.insert_recipe(&session.user_id, &draft) {
            Ok(id) => id,
            Err(e) => {
                self.release_new_image(key.as_deref(), None);
                return Err(e);
            }
        };

        info!("Published recipe {} '{}'", id, draft.title);
        self.recipe(id)
    }

    /// A recipe with its aggregates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn recipe(&self, id: i64) -> Result<RecipeCard> {
        self.storage
            .recipe_card(id)?
            .ok_or_else(|| Error::not_found("recipe", id))
    }

    /// A recipe as shown on its detail page, from the viewer's point of view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub fn recipe_details(&self, id: i64, viewer: Option<&Session>) -> Result<RecipeDetails> {
        let card = self.recipe(id)?;
        let reviews = self.storage.ratings_for_recipe(id)?;
        let summary = RatingSummary::from_ratings(reviews.iter().map(|r| &r.rating));

        let (favorited, my_rating) = match viewer {
            Some(session) => (
                self.storage.is_favorite(id, &session.user_id)?,
                self.storage.get_rating(id, &session.user_id)?,
            ),
            None => (false, None),
        };

        Ok(RecipeDetails {
            card,
            summary,
            favorited,
            my_rating,
        })
    }

    /// Edit a recipe. Only its author may do this.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`], [`Error::Forbidden`] for someone else's
    /// recipe, or a validation error.
    pub fn update_recipe(
        &self,
        session: &Session,
        id: i64,
        changes: &RecipeChanges,
        image: &ImageChange,
    ) -> Result<RecipeCard> {
        let current = self.owned_recipe(session, id)?;
        let mut draft = changes.apply_to(&current)?;
        self.check_category(draft.category_id)?;

        let key = self.resolve_image(image, draft.image.as_deref(), current.image.as_deref())?;
        draft.image.clone_from(&key);

        if let Err(e) = self.storage.update_recipe(id, &draft) {
            self.release_new_image(key.as_deref(), current.image.as_deref());
            return Err(e);
        }
        if current.image != draft.image {
            self.release_image(current.image.as_deref());
        }

        info!("Updated recipe {}", id);
        self.recipe(id)
    }

    /// Delete a recipe. Only its author may do this.
    ///
    /// The recipe's photo is removed unless something else still uses it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] or [`Error::Forbidden`].
    pub fn delete_recipe(&self, session: &Session, id: i64) -> Result<Recipe> {
        let recipe = self.owned_recipe(session, id)?;
        self.storage.delete_recipe(id)?;
        self.release_image(recipe.image.as_deref());

        info!("Deleted recipe {} '{}'", id, recipe.title);
        Ok(recipe)
    }

    /// The signed-in user's recipes, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn my_recipes(&self, session: &Session) -> Result<Vec<Recipe>> {
        self.storage.recipes_by_author(&session.user_id)
    }

    /// Browse the community feed. The page size is clamped to the
    /// configured maximum.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad filter.
    pub fn feed(&self, query: &FeedQuery) -> Result<FeedPage> {
        query.validate()?;
        let mut query = query.clone();
        query.limit = self.config.page_size(Some(query.limit));

        let cards = self.storage.feed(&query)?;
        let total = self.storage.count_recipes(&query)?;
        Ok(FeedPage {
            cards,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    // Categories

    /// The category taxonomy.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn categories(&self) -> Result<Vec<Category>> {
        self.storage.list_categories()
    }

    /// Find a category by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown name.
    pub fn category(&self, name: &str) -> Result<Category> {
        self.storage
            .get_category_by_name(name)?
            .ok_or_else(|| Error::not_found("category", name.trim()))
    }

    // Favorites

    /// Flip the favorite mark and return the new state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown recipe.
    pub fn toggle_favorite(&self, session: &Session, recipe_id: i64) -> Result<bool> {
        self.require_recipe(recipe_id)?;
        if self.storage.is_favorite(recipe_id, &session.user_id)? {
            self.storage.remove_favorite(recipe_id, &session.user_id)?;
            Ok(false)
        } else {
            self.storage.add_favorite(recipe_id, &session.user_id)?;
            Ok(true)
        }
    }

    /// Mark a recipe as a favorite. Returns `false` if it already was one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown recipe.
    pub fn add_favorite(&self, session: &Session, recipe_id: i64) -> Result<bool> {
        self.require_recipe(recipe_id)?;
        self.storage.add_favorite(recipe_id, &session.user_id)
    }

    /// Unmark a favorite. Returns `false` if it was not one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_favorite(&self, session: &Session, recipe_id: i64) -> Result<bool> {
        self.storage.remove_favorite(recipe_id, &session.user_id)
    }

    /// The signed-in user's favorite recipes, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn favorites(&self, session: &Session) -> Result<Vec<RecipeCard>> {
        let query = FeedQuery::new()
            .favorited_by(session.user_id.clone())
            .page(usize::MAX, 0);
        self.storage.feed(&query)
    }

    // Ratings

    /// Rate a recipe, replacing any earlier rating by the same user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown recipe,
    /// [`Error::Forbidden`] when rating one's own recipe and a validation
    /// error for a bad score or an overlong review.
    pub fn rate_recipe(
        &self,
        session: &Session,
        recipe_id: i64,
        score: u8,
        review: Option<&str>,
    ) -> Result<Rating> {
        let recipe = self.require_recipe(recipe_id)?;
        if recipe.is_authored_by(&session.user_id) {
            return Err(Error::forbidden("you cannot rate your own recipe"));
        }

        let score = Score::new(score)?;
        let review = normalize_review(review, self.config.ratings.max_review_length)?;

        let now = Utc::now();
        let created_at = self
            .storage
            .get_rating(recipe_id, &session.user_id)?
            .map_or(now, |existing| existing.created_at);

        let rating = Rating {
            recipe_id,
            user_id: session.user_id.clone(),
            score,
            review,
            created_at,
            updated_at: now,
        };
        self.storage.upsert_rating(&rating)?;

        debug!("Rated recipe {} with {}", recipe_id, score);
        Ok(rating)
    }

    /// Withdraw the signed-in user's rating. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_rating(&self, session: &Session, recipe_id: i64) -> Result<bool> {
        self.storage.delete_rating(recipe_id, &session.user_id)
    }

    /// All ratings of a recipe with their summary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown recipe.
    pub fn ratings(&self, recipe_id: i64) -> Result<RecipeRatings> {
        self.require_recipe(recipe_id)?;
        let reviews = self.storage.ratings_for_recipe(recipe_id)?;
        let summary = RatingSummary::from_ratings(reviews.iter().map(|r| &r.rating));
        Ok(RecipeRatings { summary, reviews })
    }

    /// Database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.stats()
    }

    fn require_recipe(&self, id: i64) -> Result<Recipe> {
        self.storage
            .get_recipe(id)?
            .ok_or_else(|| Error::not_found("recipe", id))
    }

    fn owned_recipe(&self, session: &Session, id: i64) -> Result<Recipe> {
        let recipe = self.require_recipe(id)?;
        if !recipe.is_authored_by(&session.user_id) {
            return Err(Error::forbidden(format!(
                "recipe {id} belongs to another user"
            )));
        }
        Ok(recipe)
    }

    fn check_category(&self, category_id: Option<i64>) -> Result<()> {
        match category_id {
            Some(id) if self.storage.get_category(id)?.is_none() => {
                Err(Error::not_found("category", id))
            }
            _ => Ok(()),
        }
    }

    /// The image key an edit results in, storing a new file if needed.
    /// The image key to persist. `requested` is the key carried by the
    /// draft, `stored` the one already saved.
    ///
    /// A requested key that differs from the stored one must name an image
    /// already in the store.
    fn resolve_image(
        &self,
        change: &ImageChange,
        requested: Option<&str>,
        stored: Option<&str>,
    ) -> Result<Option<String>> {
        match change {
            ImageChange::Keep => {
                if let Some(key) = requested.filter(|key| Some(*key) != stored) {
                    self.images.path_of(key)?;
                    if !self.images.exists(key) {
                        return Err(Error::image(format!("image {key} is not in the store")));
                    }
                }
                Ok(requested.map(str::to_string))
            }
            ImageChange::Remove => Ok(None),
            ImageChange::Replace(path) => self.images.store(path).map(Some),
        }
    }

    /// Delete an image file that nothing references any more.
    ///
    /// Failures are logged; the database is already consistent.
    fn release_image(&self, key: Option<&str>) {
        let Some(key) = key else { return };
        match self.storage.image_in_use(key) {
            Ok(true) => debug!("Image {} still in use", key),
            Ok(false) => {
                if let Err(e) = self.images.remove(key) {
                    warn!("Failed to remove image {}: {}", key, e);
                }
            }
            Err(e) => warn!("Failed to check image {}: {}", key, e),
        }
    }

    /// Undo storing `new` after the database write failed.
    fn release_new_image(&self, new: Option<&str>, previous: Option<&str>) {
        if new.is_some() && new != previous {
            self.release_image(new);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::ImageConfig;
    use crate::feed::FeedSort;
    use crate::model::Difficulty;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n-test-image";

    struct Fixture {
        dir: tempfile::TempDir,
        app: RecipeBox,
    }

    fn create_test_app() -> Fixture {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let images = ImageStore::open(dir.path().join("images"), &ImageConfig::default())
            .expect("failed to open image store");
        let storage = Storage::open_in_memory().expect("failed to open storage");
        let app = RecipeBox::from_parts(Config::default(), storage, images);
        Fixture { dir, app }
    }

    fn join(app: &RecipeBox, username: &str) -> Session {
        let (_, session) = app
            .sign_up(&SignUp {
                email: format!("{username}@example.com"),
                username: username.to_string(),
                password: "password123".to_string(),
                display_name: None,
            })
            .expect("sign up failed");
        session
    }

    fn draft(title: &str) -> NewRecipe {
        NewRecipe {
            ingredients: ["flour", "water"].into_iter().collect(),
            instructions: ["Mix", "Bake"].into_iter().collect(),
            ..NewRecipe::new(title)
        }
    }

    fn write_png(fixture: &Fixture, name: &str, body: &[u8]) -> PathBuf {
        let path = fixture.dir.path().join(name);
        let mut bytes = PNG.to_vec();
        bytes.extend_from_slice(body);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_sign_up_and_current_user() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");

        let resolved = fx.app.session(&session.token).unwrap();
        let me = fx.app.current_user(&resolved).unwrap();
        assert_eq!(me.username, "baker");

        assert!(fx.app.sign_out(&session.token).unwrap());
        assert!(fx.app.session(&session.token).unwrap_err().is_auth_error());
    }

    #[test]
    fn test_create_and_show_recipe() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");
        let dessert = fx.app.category("dessert").unwrap();

        let card = fx
            .app
            .create_recipe(
                &session,
                NewRecipe {
                    category_id: Some(dessert.id),
                    difficulty: Difficulty::Medium,
                    ..draft("  Brownies ")
                },
                &ImageChange::Keep,
            )
            .unwrap();

        assert_eq!(card.recipe.title, "Brownies");
        assert_eq!(card.author, "baker");
        assert_eq!(card.category.unwrap().name, "Dessert");
        assert_eq!(fx.app.recipe(card.recipe.id).unwrap().recipe.title, "Brownies");
    }

    #[test]
    fn test_create_recipe_validation() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");

        let no_steps = NewRecipe::new("Air");
        assert!(fx
            .app
            .create_recipe(&session, no_steps, &ImageChange::Keep)
            .is_err());

        let bad_category = NewRecipe {
            category_id: Some(999),
            ..draft("Bread")
        };
        let err = fx
            .app
            .create_recipe(&session, bad_category, &ImageChange::Keep)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_only_author_can_edit_or_delete() {
        let fx = create_test_app();
        let baker = join(&fx.app, "baker");
        let other = join(&fx.app, "other");
        let id = fx
            .app
            .create_recipe(&baker, draft("Bread"), &ImageChange::Keep)
            .unwrap()
            .recipe
            .id;

        let changes = RecipeChanges {
            title: Some("Stolen".to_string()),
            ..RecipeChanges::default()
        };
        let err = fx
            .app
            .update_recipe(&other, id, &changes, &ImageChange::Keep)
            .unwrap_err();
        assert!(err.is_forbidden());
        assert!(fx.app.delete_recipe(&other, id).unwrap_err().is_forbidden());

        let card = fx
            .app
            .update_recipe(&baker, id, &changes, &ImageChange::Keep)
            .unwrap();
        assert_eq!(card.recipe.title, "Stolen");

        fx.app.delete_recipe(&baker, id).unwrap();
        assert!(fx.app.recipe(id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_recipe_image_lifecycle() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");
        let first = write_png(&fx, "first.png", b"one");
        let second = write_png(&fx, "second.png", b"two");

        let card = fx
            .app
            .create_recipe(&session, draft("Bread"), &ImageChange::Replace(first))
            .unwrap();
        let first_key = card.recipe.image.clone().unwrap();
        assert!(fx.app.images().exists(&first_key));

        let card = fx
            .app
            .update_recipe(
                &session,
                card.recipe.id,
                &RecipeChanges::default(),
                &ImageChange::Replace(second),
            )
            .unwrap();
        let second_key = card.recipe.image.clone().unwrap();
        assert_ne!(first_key, second_key);
        assert!(!fx.app.images().exists(&first_key));

        fx.app.delete_recipe(&session, card.recipe.id).unwrap();
        assert!(!fx.app.images().exists(&second_key));
    }

    #[test]
    fn test_shared_image_survives_delete() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");
        let photo = write_png(&fx, "photo.png", b"shared");

        let a = fx
            .app
            .create_recipe(&session, draft("A"), &ImageChange::Replace(photo.clone()))
            .unwrap();
        let b = fx
            .app
            .create_recipe(&session, draft("B"), &ImageChange::Replace(photo))
            .unwrap();
        let key = a.recipe.image.clone().unwrap();
        assert_eq!(b.recipe.image.as_deref(), Some(key.as_str()));

        fx.app.delete_recipe(&session, a.recipe.id).unwrap();
        assert!(fx.app.images().exists(&key));
    }

    #[test]
    fn test_draft_image_key_must_be_stored() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");

        let traversal = NewRecipe {
            image: Some("../../etc/passwd".to_string()),
            ..draft("Sneaky")
        };
        let err = fx
            .app
            .create_recipe(&session, traversal, &ImageChange::Keep)
            .unwrap_err();
        assert!(matches!(err, Error::Image { .. }));

        let dangling = NewRecipe {
            image: Some(format!("{}.png", "a".repeat(64))),
            ..draft("Dangling")
        };
        let err = fx
            .app
            .create_recipe(&session, dangling, &ImageChange::Keep)
            .unwrap_err();
        assert!(matches!(err, Error::Image { .. }));

        // A key already in the store may be reused
        let photo = write_png(&fx, "photo.png", b"kept");
        let key = fx.app.images().store(&photo).unwrap();
        let card = fx
            .app
            .create_recipe(
                &session,
                NewRecipe {
                    image: Some(key.clone()),
                    ..draft("Reused")
                },
                &ImageChange::Keep,
            )
            .unwrap();
        assert_eq!(card.recipe.image, Some(key));

        let edit = RecipeChanges {
            image: Some(Some("../escape.png".to_string())),
            ..RecipeChanges::default()
        };
        assert!(fx
            .app
            .update_recipe(&session, card.recipe.id, &edit, &ImageChange::Keep)
            .is_err());
        assert_eq!(fx.app.storage().stats().unwrap().recipes, 1);
    }

    #[test]
    fn test_update_profile_with_avatar() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");
        let avatar = write_png(&fx, "me.png", b"face");

        let changes = ProfileChanges {
            display_name: Some("The Baker".to_string()),
            bio: Some("Bread all day".to_string()),
            ..ProfileChanges::default()
        };
        let profile = fx
            .app
            .update_profile(&session, &changes, &ImageChange::Replace(avatar))
            .unwrap();
        assert_eq!(profile.name(), "The Baker");
        let key = profile.avatar.clone().unwrap();
        assert!(fx.app.images().exists(&key));

        let profile = fx
            .app
            .update_profile(&session, &ProfileChanges::default(), &ImageChange::Remove)
            .unwrap();
        assert!(profile.avatar.is_none());
        assert!(!fx.app.images().exists(&key));
    }

    #[test]
    fn test_update_profile_username_rules() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");
        join(&fx.app, "cook");

        let bad = ProfileChanges {
            username: Some("no spaces".to_string()),
            ..ProfileChanges::default()
        };
        assert!(fx
            .app
            .update_profile(&session, &bad, &ImageChange::Keep)
            .is_err());

        let taken = ProfileChanges {
            username: Some("Cook".to_string()),
            ..ProfileChanges::default()
        };
        let err = fx
            .app
            .update_profile(&session, &taken, &ImageChange::Keep)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        let renamed = ProfileChanges {
            username: Some("bread_maker".to_string()),
            ..ProfileChanges::default()
        };
        fx.app
            .update_profile(&session, &renamed, &ImageChange::Keep)
            .unwrap();
        assert!(fx.app.profile("bread_maker").is_ok());
        assert!(fx.app.profile("baker").unwrap_err().is_not_found());
    }

    #[test]
    fn test_favorites() {
        let fx = create_test_app();
        let baker = join(&fx.app, "baker");
        let fan = join(&fx.app, "fan");
        let id = fx
            .app
            .create_recipe(&baker, draft("Bread"), &ImageChange::Keep)
            .unwrap()
            .recipe
            .id;

        assert!(fx.app.toggle_favorite(&fan, id).unwrap());
        assert_eq!(fx.app.favorites(&fan).unwrap().len(), 1);
        assert!(!fx.app.add_favorite(&fan, id).unwrap());
        assert!(!fx.app.toggle_favorite(&fan, id).unwrap());
        assert!(fx.app.favorites(&fan).unwrap().is_empty());
        assert!(!fx.app.remove_favorite(&fan, id).unwrap());

        assert!(fx.app.toggle_favorite(&fan, 999).unwrap_err().is_not_found());
    }

    #[test]
    fn test_ratings() {
        let fx = create_test_app();
        let baker = join(&fx.app, "baker");
        let alice = join(&fx.app, "alice");
        let bob = join(&fx.app, "bob");
        let id = fx
            .app
            .create_recipe(&baker, draft("Bread"), &ImageChange::Keep)
            .unwrap()
            .recipe
            .id;

        let first = fx
            .app
            .rate_recipe(&alice, id, 2, Some("  too salty  "))
            .unwrap();
        assert_eq!(first.review.as_deref(), Some("too salty"));

        let second = fx.app.rate_recipe(&alice, id, 4, Some("   ")).unwrap();
        assert!(second.review.is_none());
        assert_eq!(
            second.created_at.timestamp_micros(),
            first.created_at.timestamp_micros()
        );
        fx.app.rate_recipe(&bob, id, 5, None).unwrap();

        let ratings = fx.app.ratings(id).unwrap();
        assert_eq!(ratings.summary.count, 2);
        assert_eq!(ratings.summary.histogram, [0, 0, 0, 1, 1]);
        assert!((ratings.summary.average.unwrap() - 4.5).abs() < f64::EPSILON);

        let details = fx.app.recipe_details(id, Some(&alice)).unwrap();
        assert_eq!(details.my_rating.map(|r| r.score.value()), Some(4));
        assert!(!details.favorited);

        assert!(fx.app.remove_rating(&alice, id).unwrap());
        assert_eq!(fx.app.ratings(id).unwrap().summary.count, 1);
    }

    #[test]
    fn test_rating_rules() {
        let fx = create_test_app();
        let baker = join(&fx.app, "baker");
        let fan = join(&fx.app, "fan");
        let id = fx
            .app
            .create_recipe(&baker, draft("Bread"), &ImageChange::Keep)
            .unwrap()
            .recipe
            .id;

        assert!(fx.app.rate_recipe(&baker, id, 5, None).unwrap_err().is_forbidden());
        assert!(fx.app.rate_recipe(&fan, id, 0, None).is_err());
        assert!(fx.app.rate_recipe(&fan, id, 6, None).is_err());

        let long = "x".repeat(fx.app.config().ratings.max_review_length + 1);
        assert!(fx.app.rate_recipe(&fan, id, 3, Some(&long)).is_err());
        assert!(fx.app.rate_recipe(&fan, 999, 3, None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_feed_clamps_page_size() {
        let fx = create_test_app();
        let session = join(&fx.app, "baker");
        for i in 0..3 {
            fx.app
                .create_recipe(&session, draft(&format!("R{i}")), &ImageChange::Keep)
                .unwrap();
        }

        let page = fx
            .app
            .feed(&FeedQuery::new().sort(FeedSort::Oldest).page(2, 0))
            .unwrap();
        assert_eq!(page.cards.len(), 2);
        assert_eq!(page.total, 3);
        assert!(page.has_more());

        let huge = fx.app.feed(&FeedQuery::new().page(100_000, 0)).unwrap();
        assert_eq!(huge.limit, fx.app.config().feed.max_page_size);
        assert!(!huge.has_more());

        assert!(fx.app.feed(&FeedQuery::new().min_rating(9.0)).is_err());
    }

    #[test]
    fn test_my_recipes() {
        let fx = create_test_app();
        let baker = join(&fx.app, "baker");
        let cook = join(&fx.app, "cook");
        fx.app
            .create_recipe(&baker, draft("Bread"), &ImageChange::Keep)
            .unwrap();
        fx.app
            .create_recipe(&cook, draft("Soup"), &ImageChange::Keep)
            .unwrap();

        let mine = fx.app.my_recipes(&baker).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "Bread");
    }
}
