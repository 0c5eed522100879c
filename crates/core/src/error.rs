//! The error taxonomy for front-desk operations.
//!
//! Every failure a caller can see falls into one of the variants below, and
//! all of them are recoverable by the caller: a failed operation leaves no
//! partial writes behind (see [`crate::store::ClinicStore::transaction`]),
//! so retrying is always a fresh attempt against current state.

/// Errors returned by the clinic core engine.
#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    /// Malformed or missing input; names the offending field.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness constraint would be violated (duplicate booking,
    /// duplicate national id, duplicate schedule slot, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An illegal state-machine transition. Always reports the source
    /// state, the attempted target, and the full set of allowed targets so
    /// callers can present the legal next steps.
    #[error("invalid status transition from '{from}' to '{to}' (allowed: {allowed:?})")]
    InvalidTransition {
        from: String,
        to: String,
        allowed: Vec<String>,
    },

    /// A status precondition failed (for example settling a visit that is
    /// not awaiting payment). Reports the actual status observed.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The slot allocator exhausted its candidate slots.
    #[error("no available schedule slot for this department and time")]
    NoCapacity,

    /// An unanticipated internal fault. Logged at the point of origin and
    /// surfaced opaquely; never retried automatically.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClinicError {
    /// Builds a [`ClinicError::Validation`] for the given field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ClinicError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Builds a [`ClinicError::InvalidTransition`] from displayable states.
    pub fn invalid_transition<S: std::fmt::Display>(from: S, to: S, allowed: &[S]) -> Self {
        ClinicError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Type alias for Results that can fail with a [`ClinicError`].
pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
