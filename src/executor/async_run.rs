//! Asynchronous runs
//!
//! A run is moved onto the tokio blocking pool; the returned handle is
//! the completion signal. Cancellation is observed at record-source
//! fetch boundaries and discards all partial output. The request owns a
//! copy of the anchor, so the caller's cursor is never modified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::{spawn_blocking, JoinHandle};

use super::errors::{ExecutorError, ExecutorResult};
use super::executor::PipelineExecutor;
use super::handle::ObjectHandle;
use super::request::{OwnedRunRequest, RunOutcome};
use super::source::RecordSource;

/// Outstanding asynchronous run
#[derive(Debug)]
pub struct RunHandle {
    cancel: Arc<AtomicBool>,
    task: JoinHandle<ExecutorResult<RunOutcome>>,
}

impl RunHandle {
    /// Requests cancellation; the run stops at its next fetch boundary
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to finish
    pub async fn wait(self) -> ExecutorResult<RunOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ExecutorError::cancelled()),
            Err(e) => Err(ExecutorError::invalid_argument(format!(
                "Run task failed: {}",
                e
            ))),
        }
    }
}

impl PipelineExecutor {
    /// Starts a run and returns immediately.
    ///
    /// The object handle is claimed before this returns, so a second
    /// `spawn_run` on the same handle fails with `PIPE_EXEC_BUSY` until
    /// the first completes. Must be called from within a tokio runtime.
    pub fn spawn_run<S>(
        &self,
        object: &ObjectHandle<S>,
        request: OwnedRunRequest,
    ) -> ExecutorResult<RunHandle>
    where
        S: RecordSource + Send + Sync + 'static,
    {
        tokio::runtime::Handle::try_current().map_err(|_| {
            ExecutorError::invalid_argument("spawn_run requires a tokio runtime")
        })?;

        let guard = object.acquire()?;
        let cancel = Arc::new(AtomicBool::new(false));

        let executor = self.clone();
        let object = object.clone();
        let flag = Arc::clone(&cancel);
        let task = spawn_blocking(move || {
            let _guard = guard;
            executor.run_owned_acquired(object.source(), request, &flag)
        });

        Ok(RunHandle { cancel, task })
    }
}
