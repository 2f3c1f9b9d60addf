use serde::Serialize;
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{TaskEntity, TaskKind, TaskStatus};

/// Response returned when a background task is created.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskCreatedResponse {
    /// Identifier to poll the task with, valid on any instance.
    pub task_id: Uuid,
}

/// Polling view of a background task.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskStatusResponse {
    /// Task identifier.
    pub task_id: Uuid,
    /// Kind of work the task performs.
    pub kind: TaskKind,
    /// Current execution status.
    pub status: TaskStatus,
    /// Completion percentage, 0 to 100.
    pub progress: u8,
    /// Human readable description of the current step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Opaque success payload, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Failure description, present once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds since the worker started (or since creation while pending).
    pub elapsed_seconds: u64,
}

impl From<TaskEntity> for TaskStatusResponse {
    fn from(task: TaskEntity) -> Self {
        let started = task.started_at.unwrap_or(task.created_at);
        let end = task.completed_at.unwrap_or_else(SystemTime::now);
        let elapsed_seconds = end
            .duration_since(started)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);

        Self {
            task_id: task.task_id,
            kind: task.kind,
            status: task.status,
            progress: task.progress,
            step: task.step,
            result: task.result,
            error: task.error,
            elapsed_seconds,
        }
    }
}
