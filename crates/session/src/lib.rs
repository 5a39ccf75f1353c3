//! Session wiring
//!
//! One driver task per live session owns that session's turn orchestrator;
//! the process-wide registry maps session ids to their handles, creating on
//! connect and tearing down on disconnect. Sessions run fully independently:
//! the only shared state is read-mostly configuration.

pub mod driver;
pub mod registry;

pub use driver::{SessionDriver, SessionEvent, SessionOutput};
pub use registry::{SessionHandle, SessionRegistry};

use thiserror::Error;

/// Registry errors
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    /// Lookup miss; operations are rejected, never implicitly created
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Max sessions reached")]
    CapacityExceeded,
}
