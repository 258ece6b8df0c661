//! Maps a worker's terminal event to the response sent to the caller.

use crate::error::{BridgeError, SpawnError};
use crate::response::ScrapeResponse;

/// How a worker invocation ended.
#[derive(Debug)]
pub enum WorkerOutcome {
    /// The process never started.
    SpawnFailed(SpawnError),
    /// The process ran to completion. `code` is `None` when killed by a signal.
    Exited { code: Option<i32>, primary: Vec<u8> },
}

/// Build the response for a finished invocation.
///
/// Success is decided by whether stdout parses as JSON. The exit code is
/// logged but never consulted.
pub fn translate(outcome: WorkerOutcome) -> ScrapeResponse {
    match outcome {
        WorkerOutcome::SpawnFailed(cause) => {
            tracing::error!(error = %cause, "Failed to start worker process");
            BridgeError::SpawnFailure(cause).into()
        }
        WorkerOutcome::Exited { code, primary } => match parse_primary(&primary) {
            Ok(data) => {
                if code != Some(0) {
                    tracing::warn!(?code, "Worker exited unsuccessfully but produced valid JSON");
                }
                tracing::info!("Scraping completed successfully");
                ScrapeResponse::Extracted(data)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    ?code,
                    bytes = primary.len(),
                    "Worker output is not valid JSON"
                );
                BridgeError::MalformedWorkerOutput(e).into()
            }
        },
    }
}

fn parse_primary(primary: &[u8]) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::from_slice(primary)
}
