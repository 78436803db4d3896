//! # deck-task
//!
//! Process supervision engine for TaskDeck.
//! Runs configured tasks as pty-backed child processes and reports their
//! output, lifecycle and resource usage as broadcast events.
//!
//! ## Features
//!
//! - Task lifecycle control (start, stop, restart, input)
//! - Pty-backed execution with a real terminal personality
//! - Bounded per-task scrollback that survives restarts
//! - Broadcast task events (output, status, exit, stats)
//! - Two-phase stop: interrupt first, process tree kill second
//! - Periodic cpu/memory sampling with zeroed readings on stop

pub mod kill;
pub mod pty;
pub mod registry;
pub mod scrollback;
pub mod stats;
pub mod supervisor;

// Supervision
pub use supervisor::{Supervisor, SupervisorConfig};

// Execution
pub use pty::{spawn_task_pty, PtySpawn, TerminalSize};

// Task resolution
pub use registry::{ConfigRegistry, ResolvedTask, TaskRegistry};

// Scrollback
pub use scrollback::{ScrollbackBuffer, DEFAULT_SCROLLBACK_BYTES};

// Usage sampling
pub use stats::UsageSampler;

// Foundation surface, re-exported for downstream convenience
pub use deck_foundation::{
    EventHub, ProjectConfig, TaskConfig, TaskEvent, TaskId, WorkspaceConfig,
};
