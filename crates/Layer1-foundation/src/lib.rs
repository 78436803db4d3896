//! # deck-foundation
//!
//! Foundation layer for TaskDeck:
//! - Config: shared data model (tasks, projects, workspace snapshot)
//! - Error: central error type and `Result` alias
//! - Event: boundary event types and the broadcast hub
//!
//! Everything here is transport-agnostic: the supervision layer above emits
//! [`TaskEvent`]s into an [`EventHub`] and reads [`config`] types through a
//! registry seam, so it can run headless (tests) or under a GUI shell.

pub mod config;
pub mod error;
pub mod event;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (shared data model)
// ============================================================================
pub use config::{ProjectConfig, TaskConfig, TaskId, WorkspaceConfig};

// ============================================================================
// Event
// ============================================================================
pub use event::{EventHub, TaskEvent, DEFAULT_EVENT_CAPACITY};
