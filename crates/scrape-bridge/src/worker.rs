//! Worker process handle and spawn strategies.
//!
//! One handle wraps one child process launched as
//! `<program> [fixed args...] <target> <query>`. stdin is closed, stdout and
//! stderr are piped for the aggregator.

use std::process::{ExitStatus, Stdio};

use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::OwnedSemaphorePermit;
use uuid::Uuid;

use crate::config::WorkerCommand;
use crate::error::SpawnError;
use crate::request::ScrapeRequest;

/// A launched worker process.
///
/// An admission slot attached with [`WorkerHandle::hold_slot`] stays taken
/// until the process has exited, even if the handle is dropped first.
#[derive(Debug)]
pub struct WorkerHandle {
    invocation_id: Uuid,
    child: Option<Child>,
    kill_on_drop: bool,
    slot: Option<OwnedSemaphorePermit>,
}

impl WorkerHandle {
    pub fn new(invocation_id: Uuid, child: Child) -> Self {
        Self {
            invocation_id,
            child: Some(child),
            kill_on_drop: false,
            slot: None,
        }
    }

    /// Kill the process if the handle is dropped before it exits.
    pub fn with_kill_on_drop(mut self, kill: bool) -> Self {
        self.kill_on_drop = kill;
        self
    }

    /// Keep `slot` until the process exits.
    pub fn hold_slot(&mut self, slot: OwnedSemaphorePermit) {
        self.slot = Some(slot);
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    /// OS process id, if the process has not been reaped yet.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.as_mut().and_then(|c| c.stdout.take())
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.as_mut().and_then(|c| c.stderr.take())
    }

    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child_mut()?.wait().await
    }

    /// Kill the process and reap it.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child_mut()?.kill().await
    }

    fn child_mut(&mut self) -> std::io::Result<&mut Child> {
        self.child
            .as_mut()
            .ok_or_else(|| std::io::Error::other("worker handle already released"))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        // Already reaped: nothing left running.
        if child.id().is_none() {
            return;
        }

        if self.kill_on_drop
            && let Err(e) = child.start_kill()
        {
            tracing::warn!(
                invocation_id = %self.invocation_id,
                error = %e,
                "Failed to kill dropped worker"
            );
        }

        let Some(slot) = self.slot.take() else {
            // No slot to track. Dropping `child` lets tokio reap it.
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let invocation_id = self.invocation_id;
        tracing::debug!(
            %invocation_id,
            pid = ?child.id(),
            "Request dropped, worker keeps its slot until exit"
        );
        runtime.spawn(async move {
            let status = child.wait().await;
            tracing::debug!(%invocation_id, ?status, "Detached worker exited, releasing slot");
            drop(slot);
        });
    }
}

/// Extension point for different worker launch strategies.
pub trait WorkerSpawner: Send + Sync {
    fn spawn(
        &self,
        invocation_id: Uuid,
        request: &ScrapeRequest,
    ) -> Result<WorkerHandle, SpawnError>;
}

/// Launches the configured executable as a direct child process.
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    command: WorkerCommand,
    kill_on_drop: bool,
}

impl CommandSpawner {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            kill_on_drop: false,
        }
    }

    /// Kill the child if its handle is dropped before the process exits.
    pub fn with_kill_on_drop(mut self, kill: bool) -> Self {
        self.kill_on_drop = kill;
        self
    }
}

impl WorkerSpawner for CommandSpawner {
    fn spawn(
        &self,
        invocation_id: Uuid,
        request: &ScrapeRequest,
    ) -> Result<WorkerHandle, SpawnError> {
        let child = Command::new(&self.command.program)
            .args(&self.command.args)
            .args(request.worker_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(self.kill_on_drop)
            .spawn()?;

        tracing::debug!(
            %invocation_id,
            program = %self.command.program,
            pid = ?child.id(),
            "Spawned worker"
        );

        Ok(WorkerHandle::new(invocation_id, child).with_kill_on_drop(self.kill_on_drop))
    }
}
