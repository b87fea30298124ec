//! # Error Classification
//!
//! Every retry and absorption decision in the engine starts here. A backend error is
//! mapped to one of three kinds:
//!
//! | Backend signal | Kind | Handling |
//! |----------------|------|----------|
//! | resource busy / conflicting operation | [`ErrorKind::Retryable`] | retried at the mutate phase |
//! | not found | [`ErrorKind::Ignorable`] | handled by the caller (probe turns it into `Absent`) |
//! | anything else | [`ErrorKind::Fatal`] | returned immediately |
//!
//! Classification reads a structured signal from the error type ([`BackendError::signal`]),
//! never the error message. Error types that do not override `signal` are Fatal.

use std::fmt;
use std::time::Duration;

/// Structured signal a backend error exposes to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSignal {
    /// The resource is busy or another operation conflicts; try again later.
    Busy { retry_after: Option<Duration> },
    /// The entity does not exist on the backend.
    NotFound,
    /// No recognised signal.
    Other,
}

/// Contract for errors returned by backend accessors.
pub trait BackendError: std::error::Error + Send + Sync + 'static {
    /// The structured signal carried by this error. Defaults to [`BackendSignal::Other`].
    fn signal(&self) -> BackendSignal {
        BackendSignal::Other
    }
}

/// How the engine should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Retryable,
    Fatal,
    Ignorable,
}

impl ErrorKind {
    /// Classify an error by reference.
    pub fn of<E: BackendError + ?Sized>(err: &E) -> Self {
        match err.signal() {
            BackendSignal::Busy { .. } => ErrorKind::Retryable,
            BackendSignal::NotFound => ErrorKind::Ignorable,
            BackendSignal::Other => ErrorKind::Fatal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Retryable => write!(f, "retryable"),
            ErrorKind::Fatal => write!(f, "fatal"),
            ErrorKind::Ignorable => write!(f, "ignorable"),
        }
    }
}

/// A backend error together with its classification.
#[derive(Debug)]
pub struct ClassifiedError<E> {
    pub kind: ErrorKind,
    pub cause: E,
    /// Attempt number at which the error was seen, when known.
    pub attempt: Option<u32>,
    /// Backend hint for how long to wait before retrying.
    pub retry_after: Option<Duration>,
}

impl<E> ClassifiedError<E> {
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn into_cause(self) -> E {
        self.cause
    }
}

/// Classify a backend error. Total and side-effect free.
pub fn classify<E: BackendError>(err: E) -> ClassifiedError<E> {
    let retry_after = match err.signal() {
        BackendSignal::Busy { retry_after } => retry_after,
        _ => None,
    };
    ClassifiedError {
        kind: ErrorKind::of(&err),
        cause: err,
        attempt: None,
        retry_after,
    }
}
