//! # Engine Errors
//!
//! Each layer of the engine has its own error type, and each outer layer wraps the
//! inner one so nothing is lost on the way back to the caller:
//!
//! - [`SpecError`]: a [`WaitSpec`](crate::WaitSpec) that cannot be honoured.
//! - [`WaitError`]: terminal failure of one convergence wait.
//! - [`RetryError`]: terminal failure of the mutate-phase retry loop.
//! - [`TransitionError`]: what [`LifecycleOrchestrator::transition`](crate::LifecycleOrchestrator::transition)
//!   returns, tagged with the [`Phase`] it failed in.
//!
//! Callers inspect failures through [`TransitionError::phase`], [`TransitionError::kind`],
//! [`TransitionError::last_state`] and [`TransitionError::elapsed`].

use crate::adapter::OperationKind;
use crate::classify::BackendError;
use crate::state::{ObservableState, Observed};
use std::fmt;
use std::time::Duration;

/// The part of a transition a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Mutate,
    Wait,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Mutate => write!(f, "mutate"),
            Phase::Wait => write!(f, "wait"),
        }
    }
}

/// Coarse failure category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transient errors persisted past the retry budget.
    RetryExhausted,
    Fatal,
    Timeout,
    /// The caller cancelled; not a backend failure.
    Cancelled,
}

/// A wait specification that violates its own invariants.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("target state {0} is also listed as pending")]
    TargetIsPending(String),
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("a wait without a target state must accept absence as success")]
    NoTerminalCondition,
}

/// Terminal failure of a single convergence wait.
#[derive(Debug, thiserror::Error)]
pub enum WaitError<S: ObservableState, E: BackendError> {
    #[error("invalid wait spec: {0}")]
    InvalidSpec(#[from] SpecError),

    #[error("wait cancelled after {elapsed:?} (last state: {})", display_last(.last_state))]
    Cancelled {
        last_state: Option<Observed<S>>,
        elapsed: Duration,
    },

    #[error("timed out after {elapsed:?} (last state: {})", display_last(.last_state))]
    Timeout {
        last_state: Option<Observed<S>>,
        elapsed: Duration,
    },

    #[error("entity not found after {observations} consecutive probes")]
    NotFound { observations: u32, elapsed: Duration },

    #[error("unexpected state {state:?} after {elapsed:?}")]
    UnexpectedState { state: S, elapsed: Duration },

    #[error("probe failed: {source}")]
    Probe {
        #[source]
        source: E,
        last_state: Option<Observed<S>>,
        elapsed: Duration,
    },
}

fn display_last<S: fmt::Debug>(last: &Option<Observed<S>>) -> String {
    match last {
        Some(observed) => observed.to_string(),
        None => "none".to_string(),
    }
}

impl<S: ObservableState, E: BackendError> WaitError<S, E> {
    pub fn kind(&self) -> FailureKind {
        match self {
            WaitError::Cancelled { .. } => FailureKind::Cancelled,
            WaitError::Timeout { .. } => FailureKind::Timeout,
            WaitError::InvalidSpec(_)
            | WaitError::NotFound { .. }
            | WaitError::UnexpectedState { .. }
            | WaitError::Probe { .. } => FailureKind::Fatal,
        }
    }

    /// The last state a probe reported before the wait ended.
    pub fn last_state(&self) -> Option<Observed<S>> {
        match self {
            WaitError::InvalidSpec(_) => None,
            WaitError::Cancelled { last_state, .. }
            | WaitError::Timeout { last_state, .. }
            | WaitError::Probe { last_state, .. } => last_state.clone(),
            WaitError::NotFound { .. } => Some(Observed::Absent),
            WaitError::UnexpectedState { state, .. } => Some(Observed::State(state.clone())),
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitError::InvalidSpec(_) => Duration::ZERO,
            WaitError::Cancelled { elapsed, .. }
            | WaitError::Timeout { elapsed, .. }
            | WaitError::NotFound { elapsed, .. }
            | WaitError::UnexpectedState { elapsed, .. }
            | WaitError::Probe { elapsed, .. } => *elapsed,
        }
    }
}

/// Terminal failure of the bounded retry loop.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("gave up after {attempts} attempts in {elapsed:?}: {source}")]
    Exhausted {
        #[source]
        source: E,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("attempt {attempts} failed: {source}")]
    Fatal {
        #[source]
        source: E,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32, elapsed: Duration },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    pub fn kind(&self) -> FailureKind {
        match self {
            RetryError::Exhausted { .. } => FailureKind::RetryExhausted,
            RetryError::Fatal { .. } => FailureKind::Fatal,
            RetryError::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. }
            | RetryError::Fatal { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            RetryError::Exhausted { elapsed, .. }
            | RetryError::Fatal { elapsed, .. }
            | RetryError::Cancelled { elapsed, .. } => *elapsed,
        }
    }

    /// The backend error behind the failure, if any.
    pub fn backend_error(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Fatal { source, .. } => Some(source),
            RetryError::Cancelled { .. } => None,
        }
    }
}

/// The single failure outcome of a lifecycle transition.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError<S: ObservableState, E: BackendError> {
    #[error("{operation} failed in mutate phase: {source}")]
    Mutate {
        operation: OperationKind,
        #[source]
        source: RetryError<E>,
    },

    #[error("{operation} failed in wait phase: {source}")]
    Wait {
        operation: OperationKind,
        #[source]
        source: WaitError<S, E>,
    },
}

impl<S: ObservableState, E: BackendError> TransitionError<S, E> {
    pub fn operation(&self) -> OperationKind {
        match self {
            TransitionError::Mutate { operation, .. } | TransitionError::Wait { operation, .. } => {
                *operation
            }
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            TransitionError::Mutate { .. } => Phase::Mutate,
            TransitionError::Wait { .. } => Phase::Wait,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            TransitionError::Mutate { source, .. } => source.kind(),
            TransitionError::Wait { source, .. } => source.kind(),
        }
    }

    /// Last observed state. Mutate-phase failures never observed one.
    pub fn last_state(&self) -> Option<Observed<S>> {
        match self {
            TransitionError::Mutate { .. } => None,
            TransitionError::Wait { source, .. } => source.last_state(),
        }
    }

    /// Time spent in the failing phase.
    pub fn elapsed(&self) -> Duration {
        match self {
            TransitionError::Mutate { source, .. } => source.elapsed(),
            TransitionError::Wait { source, .. } => source.elapsed(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == FailureKind::Cancelled
    }
}
