//! HTML rendering for the dashboard pages.
//!
//! Templates are embedded at compile time so the binary is self-contained.
//! Charts are drawn client-side by Plotly from the data embedded here.

use chrono::NaiveDate;
use minijinja::{AutoEscape, Environment};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::auth::Identity;
use crate::dashboard::{Dashboard, View};
use crate::error::Result;
use crate::models::{DashboardFilters, InteractionRecord};

/// Browser tab title
pub const PAGE_TITLE: &str = "Digital Lawyer Data";

/// Main heading of the dashboard
pub const HEADING: &str =
    "Digital Lawyer - Data Visualization of User Interactions and Evaluations";

/// Shown instead of the pie chart when nothing matches
pub const NO_PIE_DATA_MESSAGE: &str =
    "No data available for the selected filters to display the pie chart.";

/// Shown instead of the bar chart when nothing matches
pub const NO_EVALUATIONS_MESSAGE: &str = "No evaluations available to display the bar chart.";

const PIE_TITLE: &str = "Top 10 Emails by Record Count";
const BAR_TITLE: &str = "Distribution of Evaluation Stars";

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("dashboard.html", include_str!("../../templates/dashboard.html")),
    ("error.html", include_str!("../../templates/error.html")),
];

static ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|name| {
        if name.ends_with(".html") {
            AutoEscape::Html
        } else {
            AutoEscape::None
        }
    });

    for (name, source) in TEMPLATES {
        if let Err(e) = env.add_template(name, source) {
            tracing::error!(template = name, error = %e, "Embedded template failed to parse");
        }
    }

    env
});

fn render<S: Serialize>(name: &str, ctx: S) -> Result<String> {
    Ok(ENV.get_template(name)?.render(ctx)?)
}

#[derive(Serialize)]
struct LoginContext<'a> {
    title: &'a str,
    message: Option<&'a str>,
    rejected: bool,
}

/// Login form with the gate's current message
pub fn login_page(message: Option<&str>, rejected: bool) -> Result<String> {
    render(
        "login.html",
        LoginContext {
            title: PAGE_TITLE,
            message,
            rejected,
        },
    )
}

#[derive(Serialize)]
struct ErrorContext<'a> {
    title: &'a str,
    heading: &'a str,
    message: &'a str,
}

/// Error page for a failed render cycle
pub fn error_page(message: &str) -> Result<String> {
    render(
        "error.html",
        ErrorContext {
            title: PAGE_TITLE,
            heading: HEADING,
            message,
        },
    )
}

/// Option in the exclusion multi-select
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Identity
    pub email: &'a str,
    /// Currently excluded
    pub selected: bool,
}

/// Pie chart data
#[derive(Debug, Serialize, PartialEq)]
pub struct PieChart {
    /// Chart title
    pub title: &'static str,
    /// Identities
    pub labels: Vec<String>,
    /// Record counts
    pub values: Vec<usize>,
}

/// Bar chart data
#[derive(Debug, Serialize, PartialEq)]
pub struct BarChart {
    /// Chart title
    pub title: &'static str,
    /// Star values as categories
    pub x: Vec<String>,
    /// Record counts
    pub y: Vec<usize>,
}

#[derive(Serialize)]
struct FilterValues<'a> {
    email: &'a str,
    date_from: NaiveDate,
    date_to: NaiveDate,
}

/// Everything the dashboard template needs
#[derive(Serialize)]
pub struct DashboardContext<'a> {
    title: &'static str,
    heading: &'static str,
    user_name: &'a str,
    filters: FilterValues<'a>,
    candidates: Vec<Candidate<'a>>,
    carried_exclusions: Vec<&'a str>,
    pie: Option<PieChart>,
    no_pie_message: &'static str,
    bars: Option<BarChart>,
    no_bars_message: &'static str,
    table_label: String,
    rows: &'a [InteractionRecord],
}

impl<'a> DashboardContext<'a> {
    /// Build the template context for one render
    pub fn new(
        identity: &'a Identity,
        filters: &'a DashboardFilters,
        today: NaiveDate,
        dashboard: &'a Dashboard,
    ) -> Self {
        let candidates = dashboard
            .candidates
            .iter()
            .map(|email| Candidate {
                email,
                selected: filters.excluded.contains(email),
            })
            .collect();

        // Exclusions for identities absent from this fetch ride along so the
        // next submission keeps them
        let carried_exclusions = filters
            .excluded
            .iter()
            .filter(|email| !dashboard.candidates.contains(*email))
            .map(String::as_str)
            .collect();

        let pie = dashboard.top_identities.as_ready().map(|top| PieChart {
            title: PIE_TITLE,
            labels: top.iter().map(|entry| entry.email.clone()).collect(),
            values: top.iter().map(|entry| entry.count).collect(),
        });

        let bars = match &dashboard.star_histogram {
            View::Ready(buckets) => Some(BarChart {
                title: BAR_TITLE,
                x: buckets.iter().map(|b| b.stars.to_string()).collect(),
                y: buckets.iter().map(|b| b.count).collect(),
            }),
            View::NoData => None,
        };

        Self {
            title: PAGE_TITLE,
            heading: HEADING,
            user_name: &identity.name,
            filters: FilterValues {
                email: &filters.email,
                date_from: filters.date_from,
                date_to: filters.effective_date_to(today),
            },
            candidates,
            carried_exclusions,
            pie,
            no_pie_message: NO_PIE_DATA_MESSAGE,
            bars,
            no_bars_message: NO_EVALUATIONS_MESSAGE,
            table_label: table_label(dashboard.table.count),
            rows: &dashboard.table.rows,
        }
    }
}

/// Heading above the detail table
pub fn table_label(count: usize) -> String {
    format!("Interaction and Evaluation Details - {count} Interactions")
}

/// Full dashboard page
pub fn dashboard_page(context: &DashboardContext<'_>) -> Result<String> {
    render("dashboard.html", context)
}
