//! Task registry - resolves task ids against the configuration snapshot
//!
//! The supervisor's only view of configuration. [`TaskRegistry`] is the
//! seam; [`ConfigRegistry`] is the in-process implementation over a
//! swappable [`WorkspaceConfig`] snapshot owned by the external
//! configuration provider.

use deck_foundation::{TaskConfig, TaskId, WorkspaceConfig};
use parking_lot::RwLock;
use std::path::PathBuf;

/// A task id resolved to everything needed to spawn it
#[derive(Debug, Clone)]
pub struct ResolvedTask {
    pub task: TaskConfig,
    /// Effective working directory: task override, else the project path
    pub cwd: PathBuf,
}

/// Read-side seam between the supervisor and the configuration provider.
///
/// Resolution happens on every start, so a task renamed or reconfigured in
/// the meantime is picked up without restarting the supervisor.
pub trait TaskRegistry: Send + Sync {
    /// Resolve an id to its current definition, `None` when unknown
    fn resolve(&self, id: &TaskId) -> Option<ResolvedTask>;

    /// Ids eligible for the startup sweep (task and project flags both set)
    fn auto_start_ids(&self) -> Vec<TaskId> {
        Vec::new()
    }
}

/// Registry over an in-memory workspace snapshot.
///
/// The configuration provider pushes whole snapshots through [`update`];
/// readers always see the latest one.
///
/// [`update`]: ConfigRegistry::update
pub struct ConfigRegistry {
    snapshot: RwLock<WorkspaceConfig>,
}

impl ConfigRegistry {
    pub fn new(config: WorkspaceConfig) -> Self {
        Self {
            snapshot: RwLock::new(config),
        }
    }

    /// Replace the snapshot wholesale
    pub fn update(&self, config: WorkspaceConfig) {
        *self.snapshot.write() = config;
    }
}

impl TaskRegistry for ConfigRegistry {
    fn resolve(&self, id: &TaskId) -> Option<ResolvedTask> {
        let snapshot = self.snapshot.read();
        let (project, task) = snapshot.find_task(id)?;
        Some(ResolvedTask {
            cwd: task.working_dir(project),
            task: task.clone(),
        })
    }

    fn auto_start_ids(&self) -> Vec<TaskId> {
        self.snapshot.read().auto_start_ids()
    }
}
