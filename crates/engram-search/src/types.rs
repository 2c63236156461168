//! Request/response types for the retrieval layer

use serde::{Deserialize, Serialize};

/// An event search request as it arrives from a tool call
///
/// Absolute `from_date`/`to_date` are RFC3339; relative windows are resolved
/// against "now". When both absolute and relative bounds are present the
/// absolute ones win.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSearchRequest {
    pub user_id: String,
    pub query: Option<String>,
    pub subject: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub last_hours: Option<i64>,
    pub last_days: Option<i64>,
    pub last_months: Option<u32>,
    pub limit: Option<usize>,
}

/// Search results plus "did you mean" alternatives when the scope was empty
#[derive(Debug, Clone, Serialize)]
pub struct Scoped<T> {
    pub results: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<String>>,
}

impl<T> Scoped<T> {
    pub const fn hit(results: Vec<T>) -> Self {
        Self {
            results,
            alternatives: None,
        }
    }

    pub const fn empty_with(alternatives: Vec<String>) -> Self {
        Self {
            results: Vec::new(),
            alternatives: Some(alternatives),
        }
    }
}
