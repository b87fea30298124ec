//! # Controller Lifecycle
//!
//! [`ControllerHarness`] starts the simulated controller, tells you when it is ready, and
//! shuts it down again. It is what tests and the demo binary use instead of wiring the
//! actor by hand.
//!
//! ```rust,ignore
//! let harness = ControllerHarness::start();
//! harness.wait_ready(&ctx, Duration::from_secs(30)).await?;
//!
//! let orchestrator = harness.orchestrator(policy);
//! orchestrator.transition(&ctx, &id, Operation::Adopt(config)).await?;
//!
//! harness.shutdown().await?;
//! ```
//!
//! ## Readiness
//!
//! A freshly started controller reports "not up" for a while and rejects device
//! requests with `api.err.ServiceUnavailable`. [`ControllerHarness::wait_ready`] waits
//! for it with the same convergence waiter the orchestrator uses for devices, through a
//! [`ReadinessProbe`] whose target is [`ServiceState::Ready`].
//!
//! ## Shutdown
//!
//! Orchestrators hold clones of the client, so dropping the harness's own client is not
//! enough to stop the actor. [`ControllerHarness::shutdown`] cancels the actor's shutdown
//! token and then joins its task.

use crate::controller::{self, ControllerClient};
use crate::error::{ControllerError, HarnessError};
use crate::model::ServiceState;
use async_trait::async_trait;
use reconcile_engine::{poll, EntityId, LifecycleOrchestrator, StateProbe, TrackedEntity, TransitionPolicy, WaitSpec};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Interval between readiness reads.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Probe for the controller service's own readiness.
pub struct ReadinessProbe {
    client: ControllerClient,
    id: EntityId,
}

impl ReadinessProbe {
    pub fn new(client: ControllerClient) -> Self {
        Self {
            client,
            id: EntityId::new("controller", "status"),
        }
    }
}

#[async_trait]
impl StateProbe for ReadinessProbe {
    type State = ServiceState;
    type Attributes = ();
    type Error = ControllerError;

    async fn probe(&self, ctx: &CancellationToken) -> Result<TrackedEntity<ServiceState, ()>, ControllerError> {
        let state = self.client.status(ctx).await?;
        Ok(TrackedEntity::present(self.id.clone(), state, ()))
    }
}

pub struct ControllerHarness {
    pub client: ControllerClient,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl ControllerHarness {
    /// Start a controller that is ready immediately.
    pub fn start() -> Self {
        Self::start_booting(0)
    }

    /// Start a controller that needs `boot_reads` status reads before it is ready.
    pub fn start_booting(boot_reads: u32) -> Self {
        let (actor, client) = controller::new(boot_reads);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(actor.run(shutdown.clone()));
        Self {
            client,
            shutdown,
            handle,
        }
    }

    /// One readiness read. Any error counts as not ready.
    pub async fn is_ready(&self) -> bool {
        matches!(self.client.status(&CancellationToken::new()).await, Ok(ServiceState::Ready))
    }

    #[instrument(skip(self, ctx))]
    pub async fn wait_ready(&self, ctx: &CancellationToken, timeout: Duration) -> Result<(), HarnessError> {
        let probe = ReadinessProbe::new(self.client.clone());
        let spec = WaitSpec::for_target(ServiceState::Ready)
            .with_pending([ServiceState::Starting])
            .with_poll_interval(READY_POLL_INTERVAL)
            .with_timeout(timeout);

        poll(ctx, &probe, &spec).await.map_err(HarnessError::NotReady)?;
        info!("Controller ready");
        Ok(())
    }

    /// An orchestrator driving devices on this controller.
    pub fn orchestrator(&self, policy: TransitionPolicy) -> LifecycleOrchestrator<ControllerClient> {
        LifecycleOrchestrator::new(self.client.clone()).with_policy(policy)
    }

    pub async fn shutdown(self) -> Result<(), HarnessError> {
        self.shutdown.cancel();
        drop(self.client);
        self.handle.await?;
        info!("Controller harness stopped");
        Ok(())
    }
}
