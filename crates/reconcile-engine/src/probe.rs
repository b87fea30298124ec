//! # State Probes
//!
//! A probe performs exactly one read of an entity and reports what it saw. It never
//! retries: retry policy belongs to the waiter and the orchestrator.
//!
//! The waiter is written against the [`StateProbe`] trait, so anything that can answer
//! "what state is it in now?" can be waited on: a device behind a controller
//! ([`RemoteStateProbe`]), a service readiness endpoint, or a scripted test double
//! ([`ScriptedProbe`](crate::mock::ScriptedProbe)).

use crate::adapter::{EntityOf, ResourceAdapter};
use crate::classify::{BackendError, ErrorKind};
use crate::state::{EntityId, ObservableState, TrackedEntity};
use async_trait::async_trait;
use std::fmt::Debug;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// One-shot observation of a remote entity.
#[async_trait]
pub trait StateProbe: Send + Sync {
    type State: ObservableState;
    type Attributes: Clone + Debug + Send + Sync + 'static;
    type Error: BackendError;

    /// Observe the entity once.
    ///
    /// Absence is reported as a snapshot whose state is
    /// [`Observed::Absent`](crate::Observed::Absent), not as an error.
    async fn probe(
        &self,
        ctx: &CancellationToken,
    ) -> Result<TrackedEntity<Self::State, Self::Attributes>, Self::Error>;
}

/// Probe backed by a [`ResourceAdapter::read`] call for one entity.
pub struct RemoteStateProbe<'a, R: ResourceAdapter> {
    adapter: &'a R,
    id: EntityId,
}

impl<'a, R: ResourceAdapter> RemoteStateProbe<'a, R> {
    pub fn new(adapter: &'a R, id: EntityId) -> Self {
        Self { adapter, id }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

#[async_trait]
impl<R: ResourceAdapter> StateProbe for RemoteStateProbe<'_, R> {
    type State = R::State;
    type Attributes = R::Attributes;
    type Error = R::Error;

    async fn probe(&self, ctx: &CancellationToken) -> Result<EntityOf<R>, R::Error> {
        match self.adapter.read(ctx, &self.id).await {
            Ok(entity) => {
                trace!(entity = %self.id, state = %entity.state, "Probed");
                Ok(entity)
            }
            Err(e) if ErrorKind::of(&e) == ErrorKind::Ignorable => {
                trace!(entity = %self.id, "Probed: not found");
                Ok(TrackedEntity::absent(self.id.clone()))
            }
            Err(e) => Err(e),
        }
    }
}
