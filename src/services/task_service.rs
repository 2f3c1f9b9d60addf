//! Durable task registry operations and the progress reporter used by
//! background executors.
//!
//! A task row is created synchronously before any work is dispatched, so a
//! poll request served by a different instance than the one running the work
//! still sees it. There is no reaping of tasks left in `processing` by a
//! recycled instance.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{TaskEntity, TaskKind},
    dao::session_store::SessionStore,
    dto::task::TaskStatusResponse,
    error::ServiceError,
    state::SharedState,
};

/// Create a pending task record and return it. The id exists in the store
/// before the caller dispatches any worker.
pub async fn register_task(
    store: &Arc<dyn SessionStore>,
    kind: TaskKind,
) -> Result<TaskEntity, ServiceError> {
    let task = TaskEntity::pending(Uuid::new_v4(), kind);
    store.create_task(task.clone()).await?;
    Ok(task)
}

/// Poll a task by id.
pub async fn poll_task(
    state: &SharedState,
    task_id: Uuid,
) -> Result<TaskStatusResponse, ServiceError> {
    let task = state
        .store()
        .find_task(task_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("task `{task_id}` not found")))?;
    Ok(task.into())
}

/// Best-effort progress writer handed to executors.
///
/// Progress writes must never abort the underlying work: every failure is
/// logged and swallowed. When a session is attached, progress is mirrored
/// into the session record so connected streams observe it.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn SessionStore>,
    task_id: Uuid,
    session_id: Option<Uuid>,
}

impl ProgressReporter {
    /// Build a reporter for a task, optionally mirroring into a session.
    pub fn new(store: Arc<dyn SessionStore>, task_id: Uuid, session_id: Option<Uuid>) -> Self {
        Self {
            store,
            task_id,
            session_id,
        }
    }

    /// Write progress to the task row and the session mirror.
    pub async fn report(&self, percent: u8, step: &str) {
        if let Err(err) = self
            .store
            .write_task_progress(self.task_id, percent, Some(step.to_string()))
            .await
        {
            warn!(task_id = %self.task_id, error = %err, "task progress write failed");
        }

        let Some(session_id) = self.session_id else {
            return;
        };
        let step = step.to_string();
        if let Err(err) = self
            .store
            .update_session(
                session_id,
                Box::new(move |session| {
                    session.set_generation_progress(percent, step);
                    Ok(())
                }),
            )
            .await
        {
            warn!(
                task_id = %self.task_id,
                session_id = %session_id,
                error = %err,
                "session progress mirror failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::TaskStatus;
    use crate::dao::session_store::memory::MemoryStore;

    #[tokio::test]
    async fn freshly_registered_task_polls_as_pending() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        let task = register_task(&store, TaskKind::QuestionGeneration)
            .await
            .unwrap();

        let found = store.find_task(task.task_id).await.unwrap().unwrap();
        assert_eq!(found.status, TaskStatus::Pending);
        assert_eq!(found.progress, 0);
    }

    #[tokio::test]
    async fn reporter_failures_are_swallowed() {
        let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
        // Task does not exist and no session is attached: both writes fail
        // internally but report() must not panic or error.
        let reporter = ProgressReporter::new(store, Uuid::new_v4(), None);
        reporter.report(50, "halfway").await;
    }
}
