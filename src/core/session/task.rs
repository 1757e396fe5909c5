//! Background execution of one analysis.

use super::store::{SessionId, SessionStatus, SessionStore};
use crate::core::pipeline::Pipeline;
use crate::core::source::{ImageRef, ImageSource};
use crate::error::SessionError;
use crate::events::{null_sender, EventSender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Runs a pipeline for one session on a dedicated worker thread.
///
/// The session is marked running before `spawn` returns. The worker writes
/// exactly one terminal state: `Completed` with the result (including an
/// empty-batch error payload), or `Failed` if the analysis panicked. There
/// is no cancellation.
pub struct AnalysisTask;

impl AnalysisTask {
    pub fn spawn(
        store: Arc<SessionStore>,
        id: SessionId,
        pipeline: Arc<Pipeline>,
        images: Vec<ImageRef>,
        source: Arc<dyn ImageSource>,
    ) -> Result<TaskHandle, SessionError> {
        Self::spawn_with_events(store, id, pipeline, images, source, null_sender())
    }

    pub fn spawn_with_events(
        store: Arc<SessionStore>,
        id: SessionId,
        pipeline: Arc<Pipeline>,
        images: Vec<ImageRef>,
        source: Arc<dyn ImageSource>,
        events: EventSender,
    ) -> Result<TaskHandle, SessionError> {
        store.start(id)?;

        let worker_store = Arc::clone(&store);
        let spawned = thread::Builder::new()
            .name(format!("analysis-{}", id))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    pipeline.analyze_with_events(&images, source.as_ref(), &events)
                }));

                match outcome {
                    Ok(result) => {
                        info!(session = %id, success = result.success, "analysis stored");
                        worker_store.complete(id, result)?;
                        Ok(SessionStatus::Completed)
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(session = %id, %message, "analysis worker panicked");
                        worker_store.fail(id, message)?;
                        Ok(SessionStatus::Failed)
                    }
                }
            });

        match spawned {
            Ok(handle) => Ok(TaskHandle { id, handle }),
            Err(e) => {
                store.fail(id, format!("worker could not start: {}", e))?;
                Err(SessionError::SpawnFailed(e.to_string()))
            }
        }
    }
}

/// Handle to a running analysis
pub struct TaskHandle {
    id: SessionId,
    handle: JoinHandle<Result<SessionStatus, SessionError>>,
}

impl TaskHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return the terminal status it wrote
    pub fn join(self) -> Result<SessionStatus, SessionError> {
        self.handle
            .join()
            .map_err(|payload| SessionError::SpawnFailed(panic_message(payload.as_ref())))?
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("analysis panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("analysis panicked: {}", message)
    } else {
        "analysis panicked".to_string()
    }
}
