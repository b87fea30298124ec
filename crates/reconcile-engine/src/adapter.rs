//! # Resource Adapter
//!
//! The adapter is the engine's only window onto a real backend. It supplies one read
//! call and one mutating call per operation kind, plus a description of which states
//! count as "done" and "still in progress" for each operation.
//!
//! Attribute mapping, payload construction and API specifics all live behind this
//! trait. The engine only sequences calls and interprets states.

use crate::classify::BackendError;
use crate::state::{EntityId, ObservableState, TrackedEntity};
use async_trait::async_trait;
use std::fmt::{self, Debug};
use tokio_util::sync::CancellationToken;

/// Snapshot type produced by an adapter.
pub type EntityOf<R> =
    TrackedEntity<<R as ResourceAdapter>::State, <R as ResourceAdapter>::Attributes>;

/// The kinds of lifecycle transition the orchestrator knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Adopt,
    Update,
    Forget,
}

impl OperationKind {
    /// Whether the entity must still exist once the operation has converged.
    pub fn expects_presence(self) -> bool {
        !matches!(self, OperationKind::Forget)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Adopt => write!(f, "adopt"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Forget => write!(f, "forget"),
        }
    }
}

/// A transition request with its payload.
#[derive(Debug, Clone)]
pub enum Operation<P> {
    Adopt(P),
    Update(P),
    Forget,
}

impl<P> Operation<P> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Adopt(_) => OperationKind::Adopt,
            Operation::Update(_) => OperationKind::Update,
            Operation::Forget => OperationKind::Forget,
        }
    }
}

/// The terminal and in-flight states of one operation kind.
///
/// `target` is `None` when only absence can satisfy the operation (forget-style waits).
#[derive(Debug, Clone, PartialEq)]
pub struct Convergence<S> {
    pub target: Option<S>,
    pub pending: Vec<S>,
}

impl<S> Convergence<S> {
    pub fn to(target: S, pending: impl IntoIterator<Item = S>) -> Self {
        Self {
            target: Some(target),
            pending: pending.into_iter().collect(),
        }
    }

    pub fn to_absent(pending: impl IntoIterator<Item = S>) -> Self {
        Self {
            target: None,
            pending: pending.into_iter().collect(),
        }
    }
}

/// Backend accessor for one resource type.
///
/// Every call receives the caller's [`CancellationToken`]. The engine cannot interrupt
/// I/O it does not own, so long-running calls should watch the token themselves.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    type State: ObservableState;
    /// Raw backend attributes carried in each snapshot.
    type Attributes: Clone + Debug + Send + Sync + 'static;
    /// Configuration sent with adopt and update calls.
    type Payload: Debug + Send + Sync;
    type Error: BackendError;

    /// Read the current state of an entity. A missing entity is reported as an error
    /// whose signal is [`BackendSignal::NotFound`](crate::BackendSignal::NotFound).
    async fn read(&self, ctx: &CancellationToken, id: &EntityId) -> Result<EntityOf<Self>, Self::Error>;

    async fn adopt(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        payload: &Self::Payload,
    ) -> Result<EntityOf<Self>, Self::Error>;

    async fn update(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        payload: &Self::Payload,
    ) -> Result<EntityOf<Self>, Self::Error>;

    async fn forget(&self, ctx: &CancellationToken, id: &EntityId) -> Result<EntityOf<Self>, Self::Error>;

    /// Target and in-flight states for an operation kind.
    fn convergence(&self, kind: OperationKind) -> Convergence<Self::State>;
}
