//! Accounts, passwords and sessions.
//!
//! Passwords are hashed with Argon2id into PHC strings. A successful sign up
//! or sign in opens a [`Session`] identified by an opaque UUID token; the
//! token is what clients keep between invocations.

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::model::{Profile, ProfileChanges, Session};
use crate::storage::Storage;

/// Longest accepted email address.
pub const MAX_EMAIL_LEN: usize = 254;

/// Longest accepted password. Argon2 accepts more, but nobody types this.
pub const MAX_PASSWORD_LEN: usize = 1024;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]+$").expect("email pattern is valid")
    })
}

fn username_regex() -> &'static Regex {
    static USERNAME: OnceLock<Regex> = OnceLock::new();
    USERNAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]{3,30}$").expect("username pattern is valid"))
}

/// A hash no password is checked against for real. Sign in verifies
/// against it when the email is unknown so both failures cost one Argon2
/// run. `None` only if hashing itself is broken.
fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password(&Uuid::new_v4().to_string()).ok())
        .as_deref()
}

/// Hash a password into an Argon2id PHC string with a fresh random salt.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string.
///
/// # Errors
///
/// Returns an error if the stored hash cannot be parsed. A wrong password
/// is `Ok(false)`.
pub fn verify_password(password: &str, phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc)?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Normalize and check an email address. Emails are stored lower-case.
///
/// # Errors
///
/// Returns a validation error if the address is malformed.
pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.len() > MAX_EMAIL_LEN || !email_regex().is_match(&email) {
        return Err(Error::validation("email", "is not a valid email address"));
    }
    Ok(email)
}

/// Normalize and check a username.
///
/// # Errors
///
/// Returns a validation error unless the username is 3 to 30 letters,
/// digits or underscores.
pub fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if !username_regex().is_match(username) {
        return Err(Error::validation(
            "username",
            "must be 3 to 30 letters, digits or underscores",
        ));
    }
    Ok(username.to_string())
}

/// Check a password against the length policy.
///
/// # Errors
///
/// Returns a validation error if the password is too short or too long.
pub fn validate_password(password: &str, min_len: usize) -> Result<()> {
    let len = password.chars().count();
    if len < min_len {
        return Err(Error::validation(
            "password",
            format!("must be at least {min_len} characters"),
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(Error::validation(
            "password",
            format!("must be at most {MAX_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

/// Details for a new account.
#[derive(Debug, Clone)]
pub struct SignUp {
    /// Email address, used to sign in.
    pub email: String,
    /// Public handle.
    pub username: String,
    /// Plain-text password.
    pub password: String,
    /// Optional display name.
    pub display_name: Option<String>,
}

/// Account operations against a storage backend.
#[derive(Debug)]
pub struct Accounts<'a> {
    storage: &'a Storage,
    config: &'a AuthConfig,
}

impl<'a> Accounts<'a> {
    /// Create an account manager.
    #[must_use]
    pub fn new(storage: &'a Storage, config: &'a AuthConfig) -> Self {
        Self { storage, config }
    }

    /// Register a new account and open a session for it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed input and
    /// [`Error::Conflict`] if the email or username is taken.
    pub fn sign_up(&self, request: &SignUp) -> Result<(Profile, Session)> {
        let email = validate_email(&request.email)?;
        let username = validate_username(&request.username)?;
        validate_password(&request.password, self.config.min_password_length)?;

        if self.storage.get_profile_by_email(&email)?.is_some() {
            return Err(Error::conflict("email", email));
        }
        if self.storage.get_profile_by_username(&username)?.is_some() {
            return Err(Error::conflict("username", username));
        }

        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            email,
            username,
            display_name: None,
            bio: None,
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        let profile = ProfileChanges {
            display_name: request.display_name.clone(),
            ..ProfileChanges::default()
        }
        .apply_to(&profile)?;

        let hash = hash_password(&request.password)?;
        self.storage.insert_profile(&profile, &hash)?;
        info!("Registered {}", profile.username);

        let session = self.open_session(&profile.id, now)?;
        Ok((profile, session))
    }

    /// Check credentials and open a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] for an unknown email or a wrong
    /// password alike.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<(Profile, Session)> {
        let email = email.trim().to_lowercase();
        let Some(profile) = self.storage.get_profile_by_email(&email)? else {
            debug!("Sign in for unknown email");
            if let Some(decoy) = decoy_hash() {
                verify_password(password, decoy)?;
            }
            return Err(Error::InvalidCredentials);
        };
        let Some(hash) = self.storage.password_hash_for(&profile.id)? else {
            return Err(Error::InvalidCredentials);
        };

        if !verify_password(password, &hash)? {
            warn!("Failed sign in for {}", profile.username);
            return Err(Error::InvalidCredentials);
        }

        let now = Utc::now();
        self.storage.prune_expired_sessions(now)?;
        let session = self.open_session(&profile.id, now)?;
        info!("Signed in {}", profile.username);
        Ok((profile, session))
    }

    /// End a session. Signing out an unknown token is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn sign_out(&self, token: &str) -> Result<bool> {
        let removed = self.storage.delete_session(token)?;
        if removed {
            debug!("Session closed");
        }
        Ok(removed)
    }

    /// Resolve a token to a live session.
    ///
    /// An expired session is deleted on sight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAuthenticated`] for an unknown token and
    /// [`Error::SessionExpired`] for an expired one.
    pub fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Session> {
        let session = self
            .storage
            .get_session(token)?
            .ok_or(Error::NotAuthenticated)?;

        if session.is_expired_at(now) {
            self.storage.delete_session(token)?;
            debug!("Session for {} expired", session.user_id);
            return Err(Error::SessionExpired);
        }
        Ok(session)
    }

    /// Change a user's password after checking the current one.
    ///
    /// All of the user's sessions are closed and a fresh one is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if `current` is wrong and a
    /// validation error if `new` breaks the password policy.
    pub fn change_password(&self, user_id: &str, current: &str, new: &str) -> Result<Session> {
        let hash = self
            .storage
            .password_hash_for(user_id)?
            .ok_or_else(|| Error::not_found("profile", user_id))?;
        if !verify_password(current, &hash)? {
            return Err(Error::InvalidCredentials);
        }
        validate_password(new, self.config.min_password_length)?;

        self.storage.set_password_hash(user_id, &hash_password(new)?)?;
        self.storage.delete_sessions_for_user(user_id)?;
        info!("Password changed for {}", user_id);
        self.open_session(user_id, Utc::now())
    }

    fn open_session(&self, user_id: &str, now: DateTime<Utc>) -> Result<Session> {
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + Duration::hours(i64::from(self.config.session_ttl_hours)),
        };
        self.storage.insert_session(&session)?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn signup(email: &str, username: &str) -> SignUp {
        SignUp {
            email: email.to_string(),
            username: username.to_string(),
            password: "correct horse".to_string(),
            display_name: None,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        assert_ne!(
            hash_password("same").unwrap(),
            hash_password("same").unwrap()
        );
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(verify_password("x", "not a phc string").is_err());
    }

    #[test]
    fn test_decoy_hash_rejects_everything() {
        let decoy = decoy_hash().expect("decoy hash");
        assert!(decoy.starts_with("$argon2id$"));
        assert_eq!(decoy_hash(), Some(decoy));
        assert!(!verify_password("", decoy).unwrap());
        assert!(!verify_password("password123", decoy).unwrap());
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(
            validate_email("  Cook@Example.COM ").unwrap(),
            "cook@example.com"
        );
        assert!(validate_email("cook").is_err());
        assert!(validate_email("cook@example").is_err());
        assert!(validate_email("co ok@example.com").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username(" chef_42 ").unwrap(), "chef_42");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"a".repeat(31)).is_err());
        assert!(validate_username("chef-42").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("12345678", 8).is_ok());
        assert!(validate_password("1234567", 8).is_err());
        assert!(validate_password(&"x".repeat(MAX_PASSWORD_LEN + 1), 8).is_err());
    }

    #[test]
    fn test_sign_up_and_in() {
        let storage = create_test_storage();
        let config = AuthConfig::default();
        let accounts = Accounts::new(&storage, &config);

        let (profile, session) = accounts
            .sign_up(&signup("Cook@Example.com", "cook"))
            .unwrap();
        assert_eq!(profile.email, "cook@example.com");
        assert_eq!(session.user_id, profile.id);
        assert!(session.expires_at > session.created_at);

        let (again, other) = accounts
            .sign_in("COOK@example.com", "correct horse")
            .unwrap();
        assert_eq!(again.id, profile.id);
        assert_ne!(other.token, session.token);
    }

    #[test]
    fn test_sign_up_conflicts() {
        let storage = create_test_storage();
        let config = AuthConfig::default();
        let accounts = Accounts::new(&storage, &config);
        accounts.sign_up(&signup("a@example.com", "cook")).unwrap();

        let err = accounts
            .sign_up(&signup("A@example.com", "other"))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "email", .. }));

        let err = accounts
            .sign_up(&signup("b@example.com", "COOK"))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { field: "username", .. }));
    }

    #[test]
    fn test_sign_up_rejects_short_password() {
        let storage = create_test_storage();
        let config = AuthConfig::default();
        let accounts = Accounts::new(&storage, &config);

        let mut request = signup("a@example.com", "cook");
        request.password = "short".to_string();
        let err = accounts.sign_up(&request).unwrap_err();
        assert!(matches!(err, Error::Validation { field: "password", .. }));
    }

    #[test]
    fn test_sign_in_errors_are_indistinguishable() {
        let storage = create_test_storage();
        let config = AuthConfig::default();
        let accounts = Accounts::new(&storage, &config);
        accounts.sign_up(&signup("a@example.com", "cook")).unwrap();

        let unknown = accounts.sign_in("b@example.com", "correct horse").unwrap_err();
        let wrong = accounts.sign_in("a@example.com", "wrong horse").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(wrong, Error::InvalidCredentials));
    }

    #[test]
    fn test_resolve_and_sign_out() {
        let storage = create_test_storage();
        let config = AuthConfig::default();
        let accounts = Accounts::new(&storage, &config);
        let (_, session) = accounts.sign_up(&signup("a@example.com", "cook")).unwrap();

        assert!(accounts.resolve(&session.token, Utc::now()).is_ok());
        assert!(accounts.sign_out(&session.token).unwrap());
        assert!(!accounts.sign_out(&session.token).unwrap());

        let err = accounts.resolve(&session.token, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }

    #[test]
    fn test_expired_session_is_deleted() {
        let storage = create_test_storage();
        let config = AuthConfig::default();
        let accounts = Accounts::new(&storage, &config);
        let (_, session) = accounts.sign_up(&signup("a@example.com", "cook")).unwrap();

        let later = session.expires_at + Duration::seconds(1);
        let err = accounts.resolve(&session.token, later).unwrap_err();
        assert!(matches!(err, Error::SessionExpired));
        assert!(storage.get_session(&session.token).unwrap().is_none());
    }

    #[test]
    fn test_change_password() {
        let storage = create_test_storage();
        let config = AuthConfig::default();
        let accounts = Accounts::new(&storage, &config);
        let (profile, old) = accounts.sign_up(&signup("a@example.com", "cook")).unwrap();

        assert!(accounts
            .change_password(&profile.id, "wrong", "new password")
            .is_err());

        let fresh = accounts
            .change_password(&profile.id, "correct horse", "new password")
            .unwrap();
        assert!(storage.get_session(&old.token).unwrap().is_none());
        assert!(storage.get_session(&fresh.token).unwrap().is_some());
        assert!(accounts.sign_in("a@example.com", "new password").is_ok());
        assert!(accounts.sign_in("a@example.com", "correct horse").is_err());
    }
}
