//! Login state machine
//!
//! ```text
//!   Unauthenticated --valid credentials--> Authenticated
//!   Unauthenticated --bad credentials----> Rejected
//!   Rejected --next submission-----------> Unauthenticated (then evaluated)
//!   Authenticated --logout---------------> Unauthenticated
//! ```

use serde::Serialize;
use tracing::{info, warn};

use super::credentials::{CredentialStore, Identity};

/// Shown before any credentials are submitted
pub const PROMPT_MESSAGE: &str = "Please enter your username and password";

/// Shown after a failed submission
pub const REJECTED_MESSAGE: &str = "Username/password is incorrect";

/// Authentication status of one session
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthStatus {
    /// Nothing submitted yet, or logged out
    #[default]
    Unauthenticated,
    /// Credentials matched
    Authenticated(Identity),
    /// Last submission did not match
    Rejected,
}

impl AuthStatus {
    /// Evaluate a credential submission.
    ///
    /// A session that is already authenticated ignores further submissions.
    pub fn submit(&mut self, store: &CredentialStore, username: &str, password: &str) -> &Self {
        if self.is_authenticated() {
            return self;
        }

        // A rejected session starts over before the new attempt is judged
        *self = Self::Unauthenticated;
        *self = match store.verify(username, password) {
            Some(identity) => {
                info!(username, "Login succeeded");
                Self::Authenticated(identity)
            }
            None => {
                warn!(username, "Login rejected");
                Self::Rejected
            }
        };
        self
    }

    /// Drop back to the initial state
    pub fn logout(&mut self) {
        if let Self::Authenticated(identity) = self {
            info!(username = %identity.username, "Logged out");
        }
        *self = Self::Unauthenticated;
    }

    /// The logged-in user, if any
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    /// Whether the dashboard may be shown
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Message for the login page
    pub fn login_message(&self) -> Option<&'static str> {
        match self {
            Self::Unauthenticated => Some(PROMPT_MESSAGE),
            Self::Rejected => Some(REJECTED_MESSAGE),
            Self::Authenticated(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::tests::sample_store;

    #[test]
    fn starts_unauthenticated_with_prompt() {
        let status = AuthStatus::default();
        assert_eq!(status, AuthStatus::Unauthenticated);
        assert_eq!(status.login_message(), Some(PROMPT_MESSAGE));
        assert!(status.identity().is_none());
    }

    #[test]
    fn valid_credentials_authenticate() {
        let store = sample_store();
        let mut status = AuthStatus::default();

        status.submit(&store, "jsmith", "hunter22");

        assert!(status.is_authenticated());
        assert_eq!(status.identity().unwrap().name, "John Smith");
        assert_eq!(status.login_message(), None);
    }

    #[test]
    fn bad_credentials_reject_then_recover() {
        let store = sample_store();
        let mut status = AuthStatus::default();

        status.submit(&store, "jsmith", "wrong");
        assert_eq!(status, AuthStatus::Rejected);
        assert_eq!(status.login_message(), Some(REJECTED_MESSAGE));

        status.submit(&store, "jsmith", "hunter22");
        assert!(status.is_authenticated());
    }

    #[test]
    fn submission_while_authenticated_is_ignored() {
        let store = sample_store();
        let mut status = AuthStatus::default();
        status.submit(&store, "jsmith", "hunter22");

        status.submit(&store, "rdoe", "wrong");
        assert_eq!(status.identity().unwrap().username, "jsmith");
    }

    #[test]
    fn logout_returns_to_prompt() {
        let store = sample_store();
        let mut status = AuthStatus::default();
        status.submit(&store, "rdoe", "letmein");

        status.logout();
        assert_eq!(status, AuthStatus::Unauthenticated);
        assert_eq!(status.login_message(), Some(PROMPT_MESSAGE));
    }
}
