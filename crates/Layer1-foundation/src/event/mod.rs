//! Event System - push events from the supervision layer
//!
//! The supervisor and the usage sampler publish everything they observe as
//! [`TaskEvent`]s through an [`EventHub`]; subscribers (the presentation
//! transport, tests) attach with `subscribe()` and never acknowledge.
//!
//! ```text
//!  Supervisor ──┐                       ┌── subscriber (UI transport)
//!               ├──▶ EventHub (fan-out) ┤
//!  Sampler ─────┘                       └── subscriber (tests, ...)
//! ```

pub mod hub;
pub mod types;

// Re-exports
pub use hub::{EventHub, DEFAULT_EVENT_CAPACITY};
pub use types::TaskEvent;
