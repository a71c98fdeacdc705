/// Error types for the scheduling engine.
///
/// Every rejected use-case maps to one of four recoverable kinds; the
/// caller layer decides how to present them. The engine never panics on
/// a failed validation and never performs user-facing I/O.
use thiserror::Error;

/// Failure kinds returned by scheduling use-cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// A referenced patient, practitioner, appointment, slot, or invoice
    /// does not exist.
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: u32 },

    /// The requested (practitioner, date, time) is already occupied, or a
    /// unique business key is already in use.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The appointment's current state forbids the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Malformed or out-of-range input from the caller layer.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ScheduleError {
    pub fn not_found(what: &'static str, id: u32) -> Self {
        ScheduleError::NotFound { what, id }
    }
}

/// Errors from the JSON persistence boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
