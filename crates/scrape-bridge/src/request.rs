//! Inbound request parameters and their validation.

use std::collections::HashMap;

use crate::error::BridgeError;

/// Query parameter carrying the page to scrape.
pub const TARGET_PARAM: &str = "url";
/// Query parameter carrying what to extract.
pub const QUERY_PARAM: &str = "query";

/// A validated scrape request.
///
/// Both fields are non-empty. `target` is not checked for URL syntax; the
/// worker decides what it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub target: String,
    pub query: String,
}

impl ScrapeRequest {
    pub fn new(target: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            query: query.into(),
        }
    }

    /// Build from the raw query-parameter map.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, BridgeError> {
        let field = |name: &str| {
            params
                .get(name)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(BridgeError::MissingParameter)
        };

        Ok(Self {
            target: field(TARGET_PARAM)?,
            query: field(QUERY_PARAM)?,
        })
    }

    /// Trailing worker arguments, in order.
    pub fn worker_args(&self) -> [&str; 2] {
        [&self.target, &self.query]
    }
}
