//! Shared configuration data model
//!
//! The shapes the external configuration provider hands to the supervision
//! layer: projects grouping runnable tasks. Loading, persistence and schema
//! normalization belong to that provider; this module only defines the types
//! and the read-side queries the rest of TaskDeck needs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Task ID
// ============================================================================

/// Opaque task identifier, minted by the configuration layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Task
// ============================================================================

/// One configured command to run as a supervised process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    pub id: TaskId,
    /// Display name, shown in diagnostics and the presentation layer
    pub name: String,
    /// Executable to spawn; a blank command is never runnable
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory override; the owning project's path applies when unset
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub auto_start: bool,
}

impl TaskConfig {
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            cwd: None,
            auto_start: false,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Effective working directory: own `cwd` when set, else the project path
    pub fn working_dir(&self, project: &ProjectConfig) -> PathBuf {
        self.cwd.clone().unwrap_or_else(|| project.path.clone())
    }
}

// ============================================================================
// Project
// ============================================================================

/// A group of tasks sharing a working directory context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    /// Gate for the startup sweep: tasks auto-start only when this is set too
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl ProjectConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
            auto_start: false,
            tasks: Vec::new(),
        }
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = TaskConfig>) -> Self {
        self.tasks = tasks.into_iter().collect();
        self
    }
}

// ============================================================================
// Workspace snapshot
// ============================================================================

/// Everything the configuration provider currently knows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

impl WorkspaceConfig {
    pub fn new(projects: impl IntoIterator<Item = ProjectConfig>) -> Self {
        Self {
            projects: projects.into_iter().collect(),
        }
    }

    /// Locate a task and its owning project by id
    pub fn find_task(&self, id: &TaskId) -> Option<(&ProjectConfig, &TaskConfig)> {
        for project in &self.projects {
            for task in &project.tasks {
                if &task.id == id {
                    return Some((project, task));
                }
            }
        }
        None
    }

    /// Ids eligible for the startup sweep: task flag AND project flag set
    pub fn auto_start_ids(&self) -> Vec<TaskId> {
        let mut ids = Vec::new();
        for project in &self.projects {
            if !project.auto_start {
                continue;
            }
            for task in &project.tasks {
                if task.auto_start {
                    ids.push(task.id.clone());
                }
            }
        }
        ids
    }
}
