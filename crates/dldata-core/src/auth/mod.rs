//! Authentication gate
//!
//! Credentials come from a YAML store loaded at startup. Each browser
//! session carries its own [`AuthStatus`]; only authenticated sessions reach
//! the dashboard.

pub mod credentials;
pub mod gate;
pub mod session;

pub use credentials::{hash_password, CookieSettings, CredentialStore, Identity};
pub use gate::{AuthStatus, PROMPT_MESSAGE, REJECTED_MESSAGE};
pub use session::{cookie_from_header, session_cleanup_loop, Session, SessionState, SessionStore};
