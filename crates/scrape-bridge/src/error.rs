//! Error taxonomy for the request bridge.

use std::time::Duration;

/// Failure to launch a worker process.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Every way a scrape request can end without data.
///
/// Each variant is terminal for its request. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Missing 'url' or 'query' parameter")]
    MissingParameter,

    #[error("At capacity - all worker slots busy")]
    AtCapacity,

    #[error("Worker execution failed")]
    SpawnFailure(#[source] SpawnError),

    /// Reading the worker's pipes or waiting on it failed after launch.
    #[error("Worker execution failed")]
    WorkerIo(#[source] std::io::Error),

    #[error("Invalid response from worker")]
    MalformedWorkerOutput(#[source] serde_json::Error),

    #[error("Worker timed out")]
    WorkerTimedOut(Duration),
}

impl BridgeError {
    /// Cause text echoed back to the caller, if this error exposes one.
    ///
    /// Only launch/supervision failures carry details. Parse errors stay in the log.
    pub fn details(&self) -> Option<String> {
        match self {
            BridgeError::SpawnFailure(e) => Some(e.to_string()),
            BridgeError::WorkerIo(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

impl From<SpawnError> for BridgeError {
    fn from(e: SpawnError) -> Self {
        BridgeError::SpawnFailure(e)
    }
}
