//! Core infrastructure for safeguard.
//!
//! This crate provides the shared vocabulary used by every protective
//! mechanism in the workspace:
//! - [`ErrorKind`] taxonomy and the [`Classify`] trait that maps caller
//!   errors onto it
//! - [`ErrorContext`], the immutable diagnostic record attached to failures
//! - [`ResilienceError`], the unified error of a composed call
//! - Event system for observability
//! - [`Registry`], a process-wide map of named instances

pub mod context;
pub mod error;
pub mod events;
pub mod registry;

pub use context::{ErrorContext, ErrorContextBuilder};
pub use error::{AttemptFailure, Classify, ConfigError, ErrorKind, ResilienceError, Severity};
pub use events::{
    BoxedEventListener, EventListener, EventListeners, FnListener, ResilienceEvent,
};
pub use registry::Registry;
