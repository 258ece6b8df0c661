//! ScrapeBridge: per-request orchestration from query parameters to response.
//!
//! Each request walks a strictly linear path:
//! Received → Validating → Spawning → Collecting → Completed.
//! Every path ends in exactly one [`ScrapeResponse`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregator::{self, CollectedOutput};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::request::{QUERY_PARAM, ScrapeRequest, TARGET_PARAM};
use crate::response::ScrapeResponse;
use crate::translator::{WorkerOutcome, translate};
use crate::worker::{CommandSpawner, WorkerHandle, WorkerSpawner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Validating,
    Spawning,
    Collecting,
    Completed,
}

/// Request-to-process bridge.
///
/// Holds no per-request state. The only shared resource is the optional
/// admission semaphore, whose slots are owned by the worker processes
/// rather than by the requests that launched them.
pub struct ScrapeBridge {
    config: BridgeConfig,
    spawner: Arc<dyn WorkerSpawner>,
    admission: Option<Arc<Semaphore>>,
}

impl ScrapeBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let spawner = CommandSpawner::new(config.worker.clone())
            .with_kill_on_drop(config.kill_on_disconnect);
        let admission = config
            .max_concurrent_workers
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            config,
            spawner: Arc::new(spawner),
            admission,
        }
    }

    /// Replace the launch strategy (tests, sandboxed launchers).
    pub fn with_spawner(mut self, spawner: Arc<dyn WorkerSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Free worker slots, or `None` when spawning is unbounded.
    pub fn available_permits(&self) -> Option<usize> {
        self.admission.as_ref().map(|s| s.available_permits())
    }

    /// Run one request to completion.
    pub async fn handle(&self, params: &HashMap<String, String>) -> ScrapeResponse {
        let invocation_id = Uuid::new_v4();
        let span = tracing::info_span!("scrape", %invocation_id);

        async {
            let response = self.run(invocation_id, params).await;
            tracing::debug!(
                stage = ?Stage::Completed,
                status = response.status().as_u16(),
                "Sending response"
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn run(&self, invocation_id: Uuid, params: &HashMap<String, String>) -> ScrapeResponse {
        tracing::debug!(stage = ?Stage::Received);
        tracing::info!(
            url = params.get(TARGET_PARAM).map(String::as_str).unwrap_or_default(),
            query = params.get(QUERY_PARAM).map(String::as_str).unwrap_or_default(),
            "Scraping started"
        );

        tracing::debug!(stage = ?Stage::Validating);
        let request = match ScrapeRequest::from_params(params) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting request");
                return e.into();
            }
        };

        let slot = match self.admit() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting request");
                return e.into();
            }
        };

        tracing::debug!(stage = ?Stage::Spawning);
        let mut handle = match self.spawner.spawn(invocation_id, &request) {
            Ok(h) => h,
            Err(e) => return translate(WorkerOutcome::SpawnFailed(e)),
        };
        if let Some(slot) = slot {
            handle.hold_slot(slot);
        }

        tracing::debug!(stage = ?Stage::Collecting, pid = ?handle.pid());
        match self.collect(&mut handle).await {
            Ok(CollectedOutput { status, primary }) => translate(WorkerOutcome::Exited {
                code: status.code(),
                primary,
            }),
            Err(e) => {
                tracing::error!(error = %e, "Worker supervision failed");
                e.into()
            }
        }
    }

    fn admit(&self) -> Result<Option<OwnedSemaphorePermit>, BridgeError> {
        match &self.admission {
            None => Ok(None),
            Some(sem) => Arc::clone(sem)
                .try_acquire_owned()
                .map(Some)
                .map_err(|_| BridgeError::AtCapacity),
        }
    }

    async fn collect(&self, handle: &mut WorkerHandle) -> Result<CollectedOutput, BridgeError> {
        let Some(limit) = self.config.worker_timeout else {
            return aggregator::collect(handle)
                .await
                .map_err(BridgeError::WorkerIo);
        };

        match tokio::time::timeout(limit, aggregator::collect(handle)).await {
            Ok(result) => result.map_err(BridgeError::WorkerIo),
            Err(_) => {
                tracing::warn!(pid = ?handle.pid(), ?limit, "Worker timed out, killing");
                if let Err(e) = handle.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed-out worker");
                }
                Err(BridgeError::WorkerTimedOut(limit))
            }
        }
    }
}
