//! Query and filter types shared between the HTTP and database layers

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Parameters of the single interaction query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionFilter {
    /// Case-sensitive substring of the requester email; empty matches all
    pub email_contains: String,
    /// First day included
    pub date_from: NaiveDate,
    /// Last day included
    pub date_to: NaiveDate,
}

impl InteractionFilter {
    /// Create a new filter
    pub fn new(email_contains: impl Into<String>, date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            email_contains: email_contains.into(),
            date_from,
            date_to,
        }
    }

    /// `LIKE` pattern matching the email substring literally.
    ///
    /// `%`, `_` and the escape character itself are escaped so user input
    /// never acts as a wildcard.
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.email_contains.len() + 2);
        pattern.push('%');
        for c in self.email_contains.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        pattern
    }

    /// Half-open timestamp range `[start, end)` covering both dates in full.
    pub fn timestamp_bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.date_from.and_time(chrono::NaiveTime::MIN);
        let end = self
            .date_to
            .succ_opt()
            .map_or(NaiveDateTime::MAX, |next| next.and_time(chrono::NaiveTime::MIN));
        (start, end)
    }
}

/// Filter state a session carries between renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilters {
    /// Email substring
    pub email: String,
    /// Lower date bound
    pub date_from: NaiveDate,
    /// Upper date bound; `None` tracks the current day
    pub date_to: Option<NaiveDate>,
    /// Identities removed from every view
    pub excluded: BTreeSet<String>,
}

impl DashboardFilters {
    /// Fresh filters starting at `date_from`
    pub fn new(date_from: NaiveDate) -> Self {
        Self {
            email: String::new(),
            date_from,
            date_to: None,
            excluded: BTreeSet::new(),
        }
    }

    /// Upper bound as of `today`
    pub fn effective_date_to(&self, today: NaiveDate) -> NaiveDate {
        self.date_to.unwrap_or(today)
    }

    /// Build the database query for this render
    pub fn to_query(&self, today: NaiveDate) -> InteractionFilter {
        InteractionFilter::new(
            self.email.clone(),
            self.date_from,
            self.effective_date_to(today),
        )
    }
}
