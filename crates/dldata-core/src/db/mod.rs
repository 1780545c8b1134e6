//! Database layer for dldata
//!
//! The dashboard reads from PostgreSQL through [`InteractionSource`], so the
//! HTTP layer can run against any implementation.

mod postgres;

pub use postgres::InteractionRepository;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{InteractionFilter, InteractionRecord};

/// Anything that can answer the dashboard's interaction query
#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Fetch every interaction matching `filter`, in no particular order.
    async fn fetch(&self, filter: &InteractionFilter) -> Result<Vec<InteractionRecord>>;
}
