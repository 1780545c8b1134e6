//! Credential store
//!
//! The store is a YAML document loaded once at startup:
//!
//! ```yaml
//! credentials:
//!   usernames:
//!     jsmith:
//!       email: jsmith@example.com
//!       name: John Smith
//!       password: $2b$12$...   # bcrypt hash
//! cookie:
//!   name: dldata_session
//!   key: some-long-signing-key
//!   expiry_days: 30
//! pre-authorized:
//!   emails:
//!     - new.hire@example.com
//! ```
//!
//! Every section is required and checked when the file is loaded, so a bad
//! store stops the process at startup instead of failing a login later.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Upper bound on the cookie lifetime, in days
const MAX_EXPIRY_DAYS: f64 = 3650.0;

/// Parsed and validated credential store
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialStore {
    /// Known users
    pub credentials: Credentials,

    /// Session cookie settings
    pub cookie: CookieSettings,

    /// Emails allowed to self-register
    #[serde(rename = "pre-authorized")]
    pub pre_authorized: PreAuthorized,
}

/// User table
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Users keyed by login name
    pub usernames: BTreeMap<String, UserEntry>,
}

/// One user in the credential store
#[derive(Clone, Deserialize)]
pub struct UserEntry {
    /// Contact email
    pub email: String,
    /// Display name
    pub name: String,
    /// bcrypt password hash
    pub password: String,
}

impl std::fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserEntry")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Session cookie settings
#[derive(Clone, Deserialize)]
pub struct CookieSettings {
    /// Cookie name
    pub name: String,
    /// Signing key
    pub key: String,
    /// Lifetime in days
    pub expiry_days: f64,
}

impl std::fmt::Debug for CookieSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSettings")
            .field("name", &self.name)
            .field("expiry_days", &self.expiry_days)
            .finish_non_exhaustive()
    }
}

impl CookieSettings {
    /// Cookie lifetime in whole seconds
    pub fn max_age_secs(&self) -> i64 {
        (self.expiry_days * 86_400.0).round() as i64
    }
}

/// Pre-authorized registration list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreAuthorized {
    /// Emails allowed to self-register
    #[serde(default)]
    pub emails: Vec<String>,
}

/// An authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Login name
    pub username: String,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
}

impl CredentialStore {
    /// Load and validate the store at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::credentials(format!("cannot read {}: {e}", path.display()))
        })?;

        let store = Self::from_yaml(&contents)?;
        info!(
            path = %path.display(),
            users = store.credentials.usernames.len(),
            "Loaded credential store"
        );
        Ok(store)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let store: Self = serde_yaml::from_str(contents)?;
        store.validate()?;
        Ok(store)
    }

    /// Check every field the login flow depends on.
    pub fn validate(&self) -> Result<()> {
        if self.credentials.usernames.is_empty() {
            return Err(Error::credentials("credentials.usernames is empty"));
        }

        for (username, user) in &self.credentials.usernames {
            if username.trim().is_empty() {
                return Err(Error::credentials("empty username"));
            }
            if user.name.trim().is_empty() {
                return Err(Error::credentials(format!("user '{username}' has no name")));
            }
            if !user.email.contains('@') {
                return Err(Error::credentials(format!(
                    "user '{username}' has an invalid email"
                )));
            }
            if !is_bcrypt_hash(&user.password) {
                return Err(Error::credentials(format!(
                    "user '{username}' password is not a bcrypt hash"
                )));
            }
        }

        let cookie = &self.cookie;
        if cookie.name.is_empty()
            || !cookie
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(Error::credentials(format!(
                "cookie.name '{}' is not a valid cookie name",
                cookie.name
            )));
        }
        if cookie.key.is_empty() {
            return Err(Error::credentials("cookie.key is empty"));
        }
        if !(cookie.expiry_days.is_finite()
            && cookie.expiry_days > 0.0
            && cookie.expiry_days <= MAX_EXPIRY_DAYS)
        {
            return Err(Error::credentials(format!(
                "cookie.expiry_days must be in (0, {MAX_EXPIRY_DAYS}], got {}",
                cookie.expiry_days
            )));
        }
        if cookie.max_age_secs() < 1 {
            return Err(Error::credentials("cookie.expiry_days is shorter than a second"));
        }

        if let Some(bad) = self.pre_authorized.emails.iter().find(|e| !e.contains('@')) {
            return Err(Error::credentials(format!(
                "pre-authorized email '{bad}' is invalid"
            )));
        }

        Ok(())
    }

    /// Check a username/password pair.
    pub fn verify(&self, username: &str, password: &str) -> Option<Identity> {
        let user = self.credentials.usernames.get(username)?;

        match bcrypt::verify(password, &user.password) {
            Ok(true) => Some(Identity {
                username: username.to_string(),
                name: user.name.clone(),
                email: user.email.clone(),
            }),
            Ok(false) => None,
            Err(e) => {
                warn!(username, error = %e, "Stored password hash could not be checked");
                None
            }
        }
    }
}

fn is_bcrypt_hash(value: &str) -> bool {
    value.len() == 60
        && ["$2a$", "$2b$", "$2x$", "$2y$"]
            .iter()
            .any(|prefix| value.starts_with(prefix))
}

/// Hash a password for storage in the credential store.
pub fn hash_password(password: &str) -> Result<String> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}
