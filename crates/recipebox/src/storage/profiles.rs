//! Profile and credential queries.

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::{format_time, time_column, Storage};
use crate::error::{Error, Result};
use crate::model::Profile;

const PROFILE_COLUMNS: &str =
    "id, email, username, display_name, bio, avatar, created_at, updated_at";

impl Storage {
    /// Insert a new profile with its password hash.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the email or username is taken, or an
    /// error if the database operation fails.
    pub fn insert_profile(&self, profile: &Profile, password_hash: &str) -> Result<()> {
        self.conn
            .execute(
                r"
                INSERT INTO profiles
                    (id, email, username, display_name, bio, avatar, password_hash,
                     created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
                params![
                    profile.id,
                    profile.email,
                    profile.username,
                    profile.display_name,
                    profile.bio,
                    profile.avatar,
                    password_hash,
                    format_time(&profile.created_at),
                    format_time(&profile.updated_at),
                ],
            )
            .map_err(|e| unique_profile_error(e, profile))?;

        debug!("Inserted profile {}", profile.id);
        Ok(())
    }

    /// Get a profile by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        self.profile_where("id = ?1", id)
    }

    /// Get a profile by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        self.profile_where("email = ?1", email)
    }

    /// Get a profile by username, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        self.profile_where("username = ?1", username)
    }

    /// Save the editable fields of a profile and bump `updated_at`.
    ///
    /// Returns `false` if the profile does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the new username is taken, or an error
    /// if the database operation fails.
    pub fn update_profile(&self, profile: &Profile) -> Result<bool> {
        let affected = self
            .conn
            .execute(
                r"
                UPDATE profiles
                SET username = ?2, display_name = ?3, bio = ?4, avatar = ?5, updated_at = ?6
                WHERE id = ?1
                ",
                params![
                    profile.id,
                    profile.username,
                    profile.display_name,
                    profile.bio,
                    profile.avatar,
                    format_time(&chrono::Utc::now()),
                ],
            )
            .map_err(|e| unique_profile_error(e, profile))?;
        Ok(affected > 0)
    }

    /// Delete a profile and, through cascades, everything it owns.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_profile(&self, id: &str) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM profiles WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Get the stored password hash for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn password_hash_for(&self, user_id: &str) -> Result<Option<String>> {
        let hash = self
            .conn
            .query_row(
                "SELECT password_hash FROM profiles WHERE id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    /// Replace the stored password hash for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_password_hash(&self, user_id: &str, password_hash: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE profiles SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
            params![user_id, password_hash, format_time(&chrono::Utc::now())],
        )?;
        Ok(affected > 0)
    }

    fn profile_where(&self, condition: &str, value: &str) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE {condition}"),
                [value],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        display_name: row.get(3)?,
        bio: row.get(4)?,
        avatar: row.get(5)?,
        created_at: time_column(row, 6)?,
        updated_at: time_column(row, 7)?,
    })
}

/// Turn a UNIQUE violation on `profiles` into a conflict error.
fn unique_profile_error(err: rusqlite::Error, profile: &Profile) -> Error {
    let message = match &err {
        rusqlite::Error::SqliteFailure(e, Some(message))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            message.clone()
        }
        _ => return err.into(),
    };

    if message.contains("profiles.email") {
        Error::conflict("email", profile.email.clone())
    } else if message.contains("profiles.username") {
        Error::conflict("username", profile.username.clone())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let storage = create_test_storage();
        let profile = create_profile(&storage, "baker");

        let loaded = storage.get_profile(&profile.id).unwrap().unwrap();
        assert_eq!(loaded.username, "baker");
        assert_eq!(loaded.email, "baker@example.com");
        assert_eq!(
            loaded.created_at.timestamp_micros(),
            profile.created_at.timestamp_micros()
        );
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.get_profile("missing").unwrap().is_none());
    }

    #[test]
    fn test_lookup_ignores_case() {
        let storage = create_test_storage();
        let profile = create_profile(&storage, "Baker");

        let by_email = storage.get_profile_by_email("BAKER@example.COM").unwrap();
        assert_eq!(by_email.unwrap().id, profile.id);

        let by_username = storage.get_profile_by_username("baker").unwrap();
        assert_eq!(by_username.unwrap().id, profile.id);
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let storage = create_test_storage();
        let first = create_profile(&storage, "baker");

        let mut second = first.clone();
        second.id = "other-id".to_string();
        second.username = "other".to_string();

        let err = storage.insert_profile(&second, "hash").unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "email", .. }));
    }

    #[test]
    fn test_duplicate_username_is_conflict() {
        let storage = create_test_storage();
        create_profile(&storage, "baker");
        let mut other = create_profile(&storage, "cook");

        other.username = "BAKER".to_string();
        let err = storage.update_profile(&other).unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "username", .. }));
    }

    #[test]
    fn test_update_profile() {
        let storage = create_test_storage();
        let mut profile = create_profile(&storage, "baker");

        profile.display_name = Some("The Baker".to_string());
        profile.bio = Some("Sourdough nerd".to_string());
        assert!(storage.update_profile(&profile).unwrap());

        let loaded = storage.get_profile(&profile.id).unwrap().unwrap();
        assert_eq!(loaded.display_name.as_deref(), Some("The Baker"));
        assert_eq!(loaded.bio.as_deref(), Some("Sourdough nerd"));
        assert!(loaded.updated_at >= loaded.created_at);
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let storage = create_test_storage();
        let profile = create_profile(&storage, "baker");

        assert_eq!(
            storage.password_hash_for(&profile.id).unwrap().as_deref(),
            Some("$argon2id$test")
        );
        assert!(storage.set_password_hash(&profile.id, "new").unwrap());
        assert_eq!(
            storage.password_hash_for(&profile.id).unwrap().as_deref(),
            Some("new")
        );
        assert!(storage.password_hash_for("missing").unwrap().is_none());
    }

    #[test]
    fn test_delete_profile_cascades() {
        let storage = create_test_storage();
        let author = create_profile(&storage, "baker");
        let fan = create_profile(&storage, "fan");
        let id = create_recipe(&storage, &author, "Bread");
        storage.add_favorite(id, &fan.id).unwrap();

        assert!(storage.delete_profile(&author.id).unwrap());
        assert!(storage.get_recipe(id).unwrap().is_none());
        assert!(!storage.is_favorite(id, &fan.id).unwrap());
        assert!(!storage.delete_profile(&author.id).unwrap());
    }
}
