//! Dashboard computation
//!
//! Every render fetches afresh and re-runs the whole pipeline; nothing is
//! cached between renders.

pub mod pipeline;

pub use pipeline::{Dashboard, DetailTable, IdentityCount, StarBucket, View};

use chrono::NaiveDate;
use tracing::debug;

use crate::db::InteractionSource;
use crate::error::Result;
use crate::models::DashboardFilters;

/// Fetch the rows selected by `filters` and aggregate them.
pub async fn build(
    source: &dyn InteractionSource,
    filters: &DashboardFilters,
    today: NaiveDate,
) -> Result<Dashboard> {
    let query = filters.to_query(today);
    let records = source.fetch(&query).await?;

    debug!(
        fetched = records.len(),
        excluded = filters.excluded.len(),
        date_from = %query.date_from,
        date_to = %query.date_to,
        "Running dashboard pipeline"
    );

    Ok(pipeline::run(records, &filters.excluded))
}
