//! # Kestrel Core Event System Errors
//!
//! Defines error types specific to the Kestrel event system: bus lifecycle
//! problems, listener registration conflicts, and handler failures. Dropped
//! events are deliberately *not* errors — they are counted and reported via
//! metrics and the per-bus error callback instead of failing the publisher.
use crate::event::types::BusKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventSystemError {
    #[error("Event bus '{0}' is closed")]
    BusClosed(BusKind),

    #[error("Unknown event bus: {0}")]
    UnknownBus(String),

    #[error("Listener '{id}' is already registered on bus '{bus}'")]
    DuplicateListener { id: String, bus: BusKind },

    #[error("Listener '{id}' is not registered on bus '{bus}'")]
    UnknownListener { id: String, bus: BusKind },

    #[error("Listener '{id}' failed to handle '{event}': {message}")]
    HandlerFailed {
        id: String,
        event: &'static str,
        message: String,
    },

    #[error("Internal event system error: {0}")]
    InternalError(String),
}
