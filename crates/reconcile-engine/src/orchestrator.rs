//! # Lifecycle Orchestrator
//!
//! The orchestrator turns "adopt this device" into a single, converged outcome:
//!
//! ```text
//! transition(adopt)
//!   ├─ pre-check   one probe: already Connected? return it, skip the mutation
//!   ├─ mutate      adapter.adopt() via retry_backend (busy → fixed backoff, bounded)
//!   └─ wait        poll(RemoteStateProbe, WaitSpec{Connected, [Pending, Adopting, ...]})
//! ```
//!
//! Failures come back as one [`TransitionError`] tagged with the phase they happened in.
//! Nothing partial is ever returned.
//!
//! ## Forget and "not found"
//!
//! A forget call answered with "not found" means the entity is already gone. That is
//! the one case where an [`ErrorKind::Ignorable`] error at the mutate phase lets the
//! transition carry on to the wait phase, where absence is confirmed as usual.
//!
//! ## Concurrency
//!
//! A transition is one sequential activity. The orchestrator takes no locks; callers
//! that might race two transitions on the same entity must serialize them externally.

use crate::adapter::{EntityOf, Operation, OperationKind, ResourceAdapter};
use crate::classify::ErrorKind;
use crate::error::{RetryError, TransitionError};
use crate::policy::TransitionPolicy;
use crate::probe::{RemoteStateProbe, StateProbe};
use crate::retry::{retry_backend, RetryPolicy};
use crate::state::{EntityId, Observed};
use crate::waiter::{poll, WaitSpec};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Drives adopt, update and forget transitions against one resource adapter.
pub struct LifecycleOrchestrator<R: ResourceAdapter> {
    adapter: R,
    policy: TransitionPolicy,
}

impl<R: ResourceAdapter> LifecycleOrchestrator<R> {
    pub fn new(adapter: R) -> Self {
        Self {
            adapter,
            policy: TransitionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn adapter(&self) -> &R {
        &self.adapter
    }

    pub fn policy(&self) -> &TransitionPolicy {
        &self.policy
    }

    /// The wait an operation kind performs after its mutating call succeeds.
    pub fn wait_spec(&self, kind: OperationKind) -> WaitSpec<R::State> {
        let convergence = self.adapter.convergence(kind);
        let policy = self.policy.policy_for(kind);
        WaitSpec {
            target: convergence.target,
            pending: convergence.pending,
            timeout: policy.wait_timeout,
            poll_interval: policy.poll_interval,
            not_found_grace: policy.not_found_grace,
            expect_presence: kind.expects_presence(),
        }
    }

    /// Run one transition to completion.
    ///
    /// On success returns the converged snapshot (an absent snapshot for forget).
    #[instrument(skip_all, fields(entity = %id, operation = %operation.kind()))]
    pub async fn transition(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        operation: Operation<R::Payload>,
    ) -> Result<EntityOf<R>, TransitionError<R::State, R::Error>> {
        let kind = operation.kind();
        let probe = RemoteStateProbe::new(&self.adapter, id.clone());

        if ctx.is_cancelled() {
            debug!("Cancelled before any backend call");
            return Err(TransitionError::Mutate {
                operation: kind,
                source: RetryError::Cancelled {
                    attempts: 0,
                    elapsed: Duration::ZERO,
                },
            });
        }

        if let Some(entity) = self.already_converged(ctx, &probe, kind).await {
            info!(state = %entity.state, "Already converged, skipping mutation");
            return Ok(entity);
        }

        self.mutate(ctx, id, &operation).await?;

        let spec = self.wait_spec(kind);
        let entity = poll(ctx, &probe, &spec)
            .await
            .map_err(|source| TransitionError::Wait {
                operation: kind,
                source,
            })?;

        info!(state = %entity.state, "Transition complete");
        Ok(entity)
    }

    /// Adopting an entity that is already connected would re-provision it, so adopt
    /// looks first. Probe errors here are not terminal; the mutation will surface them.
    async fn already_converged(
        &self,
        ctx: &CancellationToken,
        probe: &RemoteStateProbe<'_, R>,
        kind: OperationKind,
    ) -> Option<EntityOf<R>> {
        if kind != OperationKind::Adopt {
            return None;
        }
        let target = self.adapter.convergence(kind).target?;

        match probe.probe(ctx).await {
            Ok(entity) => match &entity.state {
                Observed::State(state) if *state == target => Some(entity),
                _ => None,
            },
            Err(e) => {
                debug!(error = %e, "Pre-check probe failed, proceeding with mutation");
                None
            }
        }
    }

    async fn mutate(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        operation: &Operation<R::Payload>,
    ) -> Result<(), TransitionError<R::State, R::Error>> {
        let kind = operation.kind();
        let policy = self.policy.policy_for(kind);
        let retry_policy = RetryPolicy::new(policy.mutate_backoff, policy.mutate_budget);

        let result = retry_backend(ctx, &retry_policy, move |attempt| {
            debug!(attempt, "Issuing mutating call");
            self.call(ctx, id, operation)
        })
        .await;

        match result {
            Ok(entity) => {
                debug!(state = %entity.state, "Mutating call accepted");
                Ok(())
            }
            Err(RetryError::Fatal { source, .. })
                if kind == OperationKind::Forget && ErrorKind::of(&source) == ErrorKind::Ignorable =>
            {
                info!("Entity already gone, confirming absence");
                Ok(())
            }
            Err(source) => {
                warn!(error = %source, "Mutating call failed");
                Err(TransitionError::Mutate {
                    operation: kind,
                    source,
                })
            }
        }
    }

    async fn call(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        operation: &Operation<R::Payload>,
    ) -> Result<EntityOf<R>, R::Error> {
        match operation {
            Operation::Adopt(payload) => self.adapter.adopt(ctx, id, payload).await,
            Operation::Update(payload) => self.adapter.update(ctx, id, payload).await,
            Operation::Forget => self.adapter.forget(ctx, id).await,
        }
    }
}
