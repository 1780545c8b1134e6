//! # dldata
//!
//! Analytics dashboard for Digital Lawyer user interactions and their evaluations.
//!
//! An authenticated analyst narrows interaction records by email substring,
//! date range and excluded requesters, then sees the top requesters, the
//! distribution of evaluation stars and the detail table.
//!
//! ## Architecture
//!
//! - **Auth**: YAML credential store, login gate and signed session cookies
//! - **Storage**: one parameterized query against PostgreSQL per render
//! - **Dashboard**: pure pipeline from fetched records to chart and table views
//! - **API**: HTML pages plus a JSON form of the same dashboard
//!
//! ## Quick Start
//!
//! ```bash
//! # Hash a password for auth.yaml
//! dldata hash-password
//!
//! # Validate configuration and database access
//! dldata check
//!
//! # Start the dashboard
//! dldata serve
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::auth::{AuthStatus, CredentialStore, Identity, SessionStore};
    pub use crate::config::Config;
    pub use crate::dashboard::{Dashboard, View};
    pub use crate::db::{InteractionRepository, InteractionSource};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}
