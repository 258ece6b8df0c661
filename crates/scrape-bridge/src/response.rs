//! Response shapes returned to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

use crate::error::BridgeError;

/// Outcome of one scrape request, ready to be sent.
///
/// Exactly one of these is produced per request.
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeResponse {
    /// Worker produced a parseable document.
    Extracted(serde_json::Value),
    /// Request was rejected before any worker ran (bare `{error}` body).
    BadRequest { error: String },
    /// Worker could not run or its output was unusable.
    Failed {
        status: StatusCode,
        error: String,
        details: Option<String>,
    },
}

impl ScrapeResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            ScrapeResponse::Extracted(_) => StatusCode::OK,
            ScrapeResponse::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ScrapeResponse::Failed { status, .. } => *status,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeResponse::Extracted(_))
    }

    pub fn body(&self) -> serde_json::Value {
        match self {
            ScrapeResponse::Extracted(data) => serde_json::json!({
                "success": true,
                "data": data,
            }),
            ScrapeResponse::BadRequest { error } => serde_json::json!({ "error": error }),
            ScrapeResponse::Failed {
                error,
                details: Some(details),
                ..
            } => serde_json::json!({
                "success": false,
                "error": error,
                "details": details,
            }),
            ScrapeResponse::Failed {
                error,
                details: None,
                ..
            } => serde_json::json!({
                "success": false,
                "error": error,
            }),
        }
    }
}

impl From<BridgeError> for ScrapeResponse {
    fn from(err: BridgeError) -> Self {
        let status = match &err {
            BridgeError::MissingParameter => {
                return ScrapeResponse::BadRequest {
                    error: err.to_string(),
                };
            }
            BridgeError::AtCapacity => StatusCode::CONFLICT,
            BridgeError::WorkerTimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            BridgeError::SpawnFailure(_)
            | BridgeError::WorkerIo(_)
            | BridgeError::MalformedWorkerOutput(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        ScrapeResponse::Failed {
            status,
            error: err.to_string(),
            details: err.details(),
        }
    }
}

impl IntoResponse for ScrapeResponse {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
