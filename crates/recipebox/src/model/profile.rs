//! User profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 80;

/// Longest accepted bio, in characters.
pub const MAX_BIO_LEN: usize = 500;

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Account id (UUID v4).
    pub id: String,
    /// Sign-in email, stored lower-case.
    pub email: String,
    /// Unique handle.
    pub username: String,
    /// Optional name shown instead of the username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Optional short biography.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Avatar image key in the image store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the profile was last edited.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// The name to show for this user.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Edit of the text fields of a profile. `None` leaves a field unchanged;
/// a blank display name or bio clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileChanges {
    /// New username.
    pub username: Option<String>,
    /// New display name.
    pub display_name: Option<String>,
    /// New bio.
    pub bio: Option<String>,
}

impl ProfileChanges {
    /// Whether the edit changes anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.display_name.is_none() && self.bio.is_none()
    }

    /// Apply the text edits to a copy of `profile`.
    ///
    /// The username is only trimmed here; account-level rules live in
    /// [`crate::auth::validate_username`].
    ///
    /// # Errors
    ///
    /// Returns a validation error if the display name or bio is too long.
    pub fn apply_to(&self, profile: &Profile) -> Result<Profile> {
        let mut updated = profile.clone();

        if let Some(username) = &self.username {
            updated.username = username.trim().to_string();
        }
        if let Some(display_name) = &self.display_name {
            updated.display_name =
                optional_text("display_name", display_name, MAX_DISPLAY_NAME_LEN)?;
        }
        if let Some(bio) = &self.bio {
            updated.bio = optional_text("bio", bio, MAX_BIO_LEN)?;
        }

        Ok(updated)
    }
}

fn optional_text(field: &'static str, text: &str, max_len: usize) -> Result<Option<String>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    if text.chars().count() > max_len {
        return Err(Error::validation(
            field,
            format!("must be at most {max_len} characters"),
        ));
    }
    Ok(Some(text.to_string()))
}
