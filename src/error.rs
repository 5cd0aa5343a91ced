use itertools::Itertools;
use thiserror::Error;

/// Reasons a typed-in time budget is refused before a session exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("enter the time as a whole number of seconds (got `{0}`)")]
    NotAnInteger(String),
    #[error("enter a time greater than 0 seconds (got {0})")]
    NonPositive(i64),
    #[error("time budget of {0} seconds is too large")]
    TooLarge(i64),
}

/// Classification of a single service reply that is not the expected success shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{kind}: {message}")]
    Rejected { kind: String, message: String },
    #[error("{0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid time budget: {0}")]
    InvalidInput(#[from] BudgetError),
    #[error("unknown exercise `{0}`")]
    UnknownExercise(String),
    #[error("connect all required sensors, missing: {}", .0.iter().join(", "))]
    MissingSensors(Vec<String>),
    #[error("a session is already running")]
    SessionActive,
    #[error("service rejected the session ({kind}): {message}")]
    RemoteRejected { kind: String, message: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("session ended unexpectedly: {0}")]
    UnknownFailure(String),
}

impl From<ProtocolError> for SessionError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Rejected { kind, message } => SessionError::RemoteRejected { kind, message },
            ProtocolError::Malformed(detail) => SessionError::MalformedResponse(detail),
        }
    }
}
