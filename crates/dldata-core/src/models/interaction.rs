//! Interaction data model

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One logged request/response pair, with its evaluation when one exists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// When the interaction was logged
    pub created_at: NaiveDateTime,

    /// Prompt sent by the user
    pub input: Option<String>,

    /// Response returned to the user
    pub output: Option<String>,

    /// Tokens consumed
    pub token_count: i64,

    /// Total cost in USD
    pub total_cost_usd: f64,

    /// Identity of the requester
    pub email: String,

    // Evaluation fields (left-joined, absent when the interaction was never rated)
    /// Star rating, 0 through 5
    pub stars: Option<i32>,

    /// Evaluation free text
    pub text: Option<String>,

    /// Interaction identifier
    pub id: String,
}
