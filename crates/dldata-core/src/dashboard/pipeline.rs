//! Filter-and-aggregate pipeline
//!
//! Turns the rows of one fetch into the three dashboard views: the top
//! identities by record count, the star histogram and the detail table.
//! The pipeline is a pure function of its inputs, so re-running it on the
//! same rows always yields identical aggregates.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::InteractionRecord;

/// Number of identities kept in the frequency view
pub const TOP_IDENTITIES: usize = 10;

/// Star values that always get a histogram bucket
pub const STAR_DOMAIN: std::ops::RangeInclusive<i32> = 0..=5;

/// A view that is either renderable or explicitly empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum View<T> {
    /// Data to render
    Ready(T),
    /// Nothing to render for the current filters
    NoData,
}

impl<T> View<T> {
    /// Borrow the data if the view is ready
    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Self::Ready(data) => Some(data),
            Self::NoData => None,
        }
    }

    /// Whether the view has nothing to show
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// Record count for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityCount {
    /// Identity (email)
    pub email: String,
    /// Number of post-exclusion records
    pub count: usize,
}

/// One bucket of the star histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StarBucket {
    /// Star value
    pub stars: i32,
    /// Number of records rated with this value
    pub count: usize,
}

/// The post-exclusion records in display order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailTable {
    /// Rows, newest first
    pub rows: Vec<InteractionRecord>,
    /// Number of rows
    pub count: usize,
}

/// Everything the dashboard renders for one fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// Identities offered for exclusion, in order of first appearance
    pub candidates: Vec<String>,
    /// Most frequent identities, highest count first
    pub top_identities: View<Vec<IdentityCount>>,
    /// Dense histogram over [`STAR_DOMAIN`]
    pub star_histogram: View<Vec<StarBucket>>,
    /// Detail table
    pub table: DetailTable,
}

/// Run the full pipeline over one fetch result.
pub fn run(mut records: Vec<InteractionRecord>, excluded: &BTreeSet<String>) -> Dashboard {
    sort_newest_first(&mut records);

    let candidates = distinct_identities(&records);

    if !excluded.is_empty() {
        records.retain(|record| !excluded.contains(&record.email));
    }

    let (top_identities, star_histogram) = if records.is_empty() {
        (View::NoData, View::NoData)
    } else {
        (
            View::Ready(top_identities(&records, TOP_IDENTITIES)),
            View::Ready(star_histogram(&records)),
        )
    };

    let count = records.len();
    Dashboard {
        candidates,
        top_identities,
        star_histogram,
        table: DetailTable {
            rows: records,
            count,
        },
    }
}

/// Stable sort by `created_at`, newest first; ties keep fetch order.
pub fn sort_newest_first(records: &mut [InteractionRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Distinct identities in order of first appearance
pub fn distinct_identities(records: &[InteractionRecord]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter(|record| seen.insert(record.email.as_str()))
        .map(|record| record.email.clone())
        .collect()
}

/// The `limit` identities with the most records.
///
/// Equal counts rank by first appearance in `records`. Identities past the
/// limit are dropped, not folded into an "other" entry.
pub fn top_identities(records: &[InteractionRecord], limit: usize) -> Vec<IdentityCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<IdentityCount> = Vec::new();

    for record in records {
        match index.get(record.email.as_str()) {
            Some(&slot) => counts[slot].count += 1,
            None => {
                index.insert(record.email.as_str(), counts.len());
                counts.push(IdentityCount {
                    email: record.email.clone(),
                    count: 1,
                });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

/// Dense star histogram; unrated and out-of-domain records are skipped.
pub fn star_histogram(records: &[InteractionRecord]) -> Vec<StarBucket> {
    let mut buckets: Vec<StarBucket> = STAR_DOMAIN
        .map(|stars| StarBucket { stars, count: 0 })
        .collect();

    for stars in records.iter().filter_map(|record| record.stars) {
        if STAR_DOMAIN.contains(&stars) {
            let slot = (stars - STAR_DOMAIN.start()) as usize;
            buckets[slot].count += 1;
        }
    }

    buckets
}
