//! # Reconcile Engine
//!
//! This crate drives entities that live in an external system (a network controller,
//! a cloud API, a freshly launched service) to a desired state, and tells you exactly
//! how it went.
//!
//! External systems are *eventually consistent*: a mutating call is accepted long before
//! its effect is visible, intermediate states come and go, entities briefly vanish from
//! listings, and "busy" answers are routine. The engine turns that into one
//! well-defined outcome per transition.
//!
//! ## Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   transition ──►│    LifecycleOrchestrator     │
//!                 │  pre-check → mutate → wait   │
//!                 └───────┬──────────────┬───────┘
//!                         │              │
//!              retry_backend()        poll()
//!              (fixed backoff)     (StateConvergence)
//!                         │              │
//!                         ▼              ▼
//!                 ResourceAdapter ◄── RemoteStateProbe
//!                  adopt / update       read, NotFound → Absent
//!                  forget / read
//! ```
//!
//! 1. **Classification** ([`classify`](mod@classify)): every backend error carries a
//!    structured [`BackendSignal`], mapped to [`ErrorKind::Retryable`], [`ErrorKind::Fatal`]
//!    or [`ErrorKind::Ignorable`].
//! 2. **Probing** ([`probe`]): one read, absence reported as [`Observed::Absent`].
//! 3. **Waiting** ([`waiter`]): poll until target, pending, absent or unexpected decides.
//! 4. **Orchestration** ([`orchestrator`]): one entry point per transition, errors tagged
//!    with the [`Phase`] they happened in.
//!
//! ## Quick Start
//!
//! ```rust
//! use reconcile_engine::mock::{MockAdapter, TestState};
//! use reconcile_engine::{EntityId, LifecycleOrchestrator, Observed, Operation};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let adapter = MockAdapter::new();
//!     adapter.expect_adopt().return_ok(TestState::Adopting);
//!     adapter.expect_read().return_state(TestState::Pending);
//!     adapter.expect_read().return_state(TestState::Connected);
//!
//!     let orchestrator = LifecycleOrchestrator::new(adapter);
//!     let id = EntityId::new("default", "aa:bb:cc:dd:ee:ff");
//!     let entity = orchestrator
//!         .transition(&CancellationToken::new(), &id, Operation::Adopt("site".to_string()))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(entity.state, Observed::State(TestState::Connected));
//! }
//! ```
//!
//! ## Concurrency
//!
//! Every wait and retry is a sequential async activity owned by its caller. Nothing is
//! spawned, no state is shared between transitions, and all timing goes through
//! `tokio::time`, so tests can run on paused time.
//!
//! ## Testing
//!
//! The [`mock`] module provides a [`ScriptedProbe`](mock::ScriptedProbe) for the waiter and
//! a [`MockAdapter`](mock::MockAdapter) with queued expectations for the orchestrator.

pub mod adapter;
pub mod classify;
pub mod error;
pub mod mock;
pub mod orchestrator;
pub mod policy;
pub mod probe;
pub mod retry;
pub mod state;
pub mod tracing;
pub mod waiter;

// Re-export core types for convenience
pub use adapter::{Convergence, EntityOf, Operation, OperationKind, ResourceAdapter};
pub use classify::{classify, BackendError, BackendSignal, ClassifiedError, ErrorKind};
pub use error::{FailureKind, Phase, RetryError, SpecError, TransitionError, WaitError};
pub use orchestrator::LifecycleOrchestrator;
pub use policy::{OperationPolicy, TransitionPolicy};
pub use probe::{RemoteStateProbe, StateProbe};
pub use retry::{is_transient, retry, retry_backend, RetryPolicy};
pub use state::{EntityId, ObservableState, Observed, TrackedEntity};
pub use waiter::{poll, WaitSpec};
