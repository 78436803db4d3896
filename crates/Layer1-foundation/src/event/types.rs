//! Boundary event types
//!
//! Everything the supervision layer pushes outward, in one enum. The JSON
//! shape (tagged variants, camelCase fields) is what the presentation layer
//! receives over its transport.

use crate::config::TaskId;
use serde::{Deserialize, Serialize};

/// Push event emitted by the supervision layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TaskEvent {
    /// One chunk of process output, in arrival order per task
    Data { task_id: TaskId, chunk: String },

    /// Liveness change for a task
    Status { task_id: TaskId, running: bool },

    /// The process for a task exited
    Exit {
        task_id: TaskId,
        exit_code: i32,
        /// Signal name when the process was terminated by one (unix)
        #[serde(skip_serializing_if = "Option::is_none")]
        signal: Option<String>,
    },

    /// Resource usage sample for a task
    Stats {
        task_id: TaskId,
        /// CPU usage in percent
        cpu: f64,
        /// Resident memory in megabytes
        memory_mb: f64,
    },
}

impl TaskEvent {
    /// The task this event concerns
    pub fn task_id(&self) -> &TaskId {
        match self {
            TaskEvent::Data { task_id, .. }
            | TaskEvent::Status { task_id, .. }
            | TaskEvent::Exit { task_id, .. }
            | TaskEvent::Stats { task_id, .. } => task_id,
        }
    }

    /// Stats event reporting no usage, sent for tasks that stopped or
    /// could not be sampled
    pub fn zeroed_stats(task_id: TaskId) -> Self {
        TaskEvent::Stats {
            task_id,
            cpu: 0.0,
            memory_mb: 0.0,
        }
    }
}
