//! Data models for dldata

mod interaction;
mod query;

pub use interaction::*;
pub use query::*;
