//! Server-side sessions
//!
//! Each browser holds an opaque random token in a signed cookie. The server
//! keys session state by the SHA-256 of that token, so the stored keys are
//! useless without the cookie itself. State never lives in a process-wide
//! flag: every request reads and writes only its own entry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::credentials::CookieSettings;
use super::gate::AuthStatus;
use crate::models::DashboardFilters;

type HmacSha256 = Hmac<Sha256>;

/// Server-side lifetime of a session that has not logged in, in seconds
pub const UNAUTHENTICATED_TTL_SECS: i64 = 15 * 60;

/// Everything the server remembers about one browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Login status
    pub auth: AuthStatus,
    /// Filters carried between renders
    pub filters: DashboardFilters,
}

struct SessionEntry {
    state: SessionState,
    expires_at: DateTime<Utc>,
}

/// A resolved session for the current request
#[derive(Debug, Clone)]
pub struct Session {
    key: String,
    /// Cookie value to send back when the session was just created
    pub issued: Option<String>,
}

/// In-memory session table
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    cookie_name: String,
    signing_key: Vec<u8>,
    max_age_secs: i64,
    secure: bool,
    default_date_from: NaiveDate,
}

impl SessionStore {
    /// Create a store using the credential store's cookie settings
    pub fn new(cookie: &CookieSettings, default_date_from: NaiveDate, secure: bool) -> Self {
        Self {
            sessions: DashMap::new(),
            cookie_name: cookie.name.clone(),
            signing_key: cookie.key.as_bytes().to_vec(),
            max_age_secs: cookie.max_age_secs(),
            secure,
            default_date_from,
        }
    }

    /// Name of the session cookie
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions exist
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Map a request's cookie to its session, starting a new one when the
    /// cookie is missing, forged, unknown or expired.
    pub fn resolve(&self, cookie_value: Option<&str>) -> Session {
        let now = Utc::now();

        if let Some(token) = cookie_value.and_then(|value| self.verify(value)) {
            let key = hash_token(&token);
            let live = self
                .sessions
                .get(&key)
                .is_some_and(|entry| entry.expires_at > now);
            if live {
                return Session { key, issued: None };
            }
            self.sessions.remove(&key);
        }

        self.create(self.fresh_state(), now)
    }

    /// Snapshot of a session's state
    pub fn state(&self, session: &Session) -> SessionState {
        self.sessions
            .get(&session.key)
            .map_or_else(|| self.fresh_state(), |entry| entry.state.clone())
    }

    /// Mutate a session's state in place
    pub fn update<R>(&self, session: &Session, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut entry = self
            .sessions
            .entry(session.key.clone())
            .or_insert_with(|| {
                let state = self.fresh_state();
                SessionEntry {
                    expires_at: Utc::now() + self.ttl(&state),
                    state,
                }
            });
        f(&mut entry.state)
    }

    /// Move a session's state under a new token, invalidating the old one.
    ///
    /// Used on login so a token seen before authentication never carries
    /// an authenticated session.
    pub fn rotate(&self, session: &Session) -> Session {
        let state = self
            .sessions
            .remove(&session.key)
            .map_or_else(|| self.fresh_state(), |(_, entry)| entry.state);
        self.create(state, Utc::now())
    }

    /// Forget a session entirely
    pub fn destroy(&self, session: &Session) {
        if self.sessions.remove(&session.key).is_some() {
            debug!("Session destroyed");
        }
    }

    /// Drop every session that expired before `now`
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    /// `Set-Cookie` value carrying a session cookie
    pub fn session_cookie(&self, value: &str) -> String {
        let secure_flag = if self.secure { "; Secure" } else { "" };
        format!(
            "{}={value}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{secure_flag}",
            self.cookie_name, self.max_age_secs
        )
    }

    /// `Set-Cookie` value that deletes the session cookie
    pub fn clear_cookie(&self) -> String {
        let secure_flag = if self.secure { "; Secure" } else { "" };
        format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{secure_flag}",
            self.cookie_name
        )
    }

    fn fresh_state(&self) -> SessionState {
        SessionState {
            auth: AuthStatus::default(),
            filters: DashboardFilters::new(self.default_date_from),
        }
    }

    fn create(&self, state: SessionState, now: DateTime<Utc>) -> Session {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let key = hash_token(&token);
        self.sessions.insert(
            key.clone(),
            SessionEntry {
                expires_at: now + self.ttl(&state),
                state,
            },
        );

        Session {
            key,
            issued: Some(self.sign(&token)),
        }
    }

    /// Anonymous sessions only live long enough to finish a login
    fn ttl(&self, state: &SessionState) -> Duration {
        if state.auth.is_authenticated() {
            Duration::seconds(self.max_age_secs)
        } else {
            Duration::seconds(self.max_age_secs.min(UNAUTHENTICATED_TTL_SECS))
        }
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.signing_key).expect("HMAC accepts any key length")
    }

    fn sign(&self, token: &str) -> String {
        let mut mac = self.mac();
        mac.update(token.as_bytes());
        format!("{token}.{}", hex::encode(mac.finalize().into_bytes()))
    }

    fn verify(&self, value: &str) -> Option<String> {
        let (token, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac();
        mac.update(token.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(token.to_string())
    }
}

/// Spawnable loop that purges expired sessions every `interval`.
pub async fn session_cleanup_loop(store: std::sync::Arc<SessionStore>, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let purged = store.purge_expired(Utc::now());
        if purged > 0 {
            info!(purged, remaining = store.len(), "Purged expired sessions");
        }
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extract the named cookie from a `Cookie` header value.
pub fn cookie_from_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}
