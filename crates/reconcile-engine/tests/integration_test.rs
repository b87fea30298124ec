use async_trait::async_trait;
use reconcile_engine::{
    classify, poll, BackendError, BackendSignal, Convergence, EntityId, EntityOf, ErrorKind, FailureKind,
    LifecycleOrchestrator, ObservableState, OperationKind, Observed, Operation, OperationPolicy, Phase,
    ResourceAdapter, StateProbe, TrackedEntity, TransitionPolicy, WaitSpec,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// --- Test Backend: a tiny cloud that boots instances over a few reads ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InstanceState {
    Launching,
    Booting,
    Running,
    Stopping,
    Failed,
}

impl ObservableState for InstanceState {}

#[derive(Clone, Debug, PartialEq)]
struct InstanceInfo {
    image: String,
}

#[derive(Debug, thiserror::Error)]
enum CloudError {
    #[error("throttled")]
    Throttled,
    #[error("instance {0} does not exist")]
    NoSuchInstance(String),
    #[error("quota exceeded")]
    Quota,
}

impl BackendError for CloudError {
    fn signal(&self) -> BackendSignal {
        match self {
            CloudError::Throttled => BackendSignal::Busy {
                retry_after: Some(Duration::from_secs(2)),
            },
            CloudError::NoSuchInstance(_) => BackendSignal::NotFound,
            CloudError::Quota => BackendSignal::Other,
        }
    }
}

struct Instance {
    image: String,
    /// States still to be reported, one per read.
    upcoming: Vec<InstanceState>,
    current: InstanceState,
}

#[derive(Default)]
struct FakeCloud {
    instances: Mutex<HashMap<EntityId, Instance>>,
    throttle_launches: Mutex<u32>,
    fail_boot: bool,
}

impl FakeCloud {
    fn throttled(launches: u32) -> Self {
        let cloud = Self::default();
        *cloud.throttle_launches.lock().unwrap() = launches;
        cloud
    }

    fn snapshot(id: &EntityId, instance: &Instance) -> EntityOf<Self> {
        TrackedEntity::present(
            id.clone(),
            instance.current,
            InstanceInfo {
                image: instance.image.clone(),
            },
        )
    }
}

#[async_trait]
impl ResourceAdapter for FakeCloud {
    type State = InstanceState;
    type Attributes = InstanceInfo;
    type Payload = String;
    type Error = CloudError;

    async fn read(&self, _ctx: &CancellationToken, id: &EntityId) -> Result<EntityOf<Self>, CloudError> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances
            .get_mut(id)
            .ok_or_else(|| CloudError::NoSuchInstance(id.to_string()))?;
        if !instance.upcoming.is_empty() {
            instance.current = instance.upcoming.remove(0);
        }
        if instance.current == InstanceState::Stopping && instance.upcoming.is_empty() {
            instances.remove(id);
            return Err(CloudError::NoSuchInstance(id.to_string()));
        }
        Ok(Self::snapshot(id, &instances[id]))
    }

    async fn adopt(&self, _ctx: &CancellationToken, id: &EntityId, image: &String) -> Result<EntityOf<Self>, CloudError> {
        {
            let mut throttle = self.throttle_launches.lock().unwrap();
            if *throttle > 0 {
                *throttle -= 1;
                return Err(CloudError::Throttled);
            }
        }
        let last = if self.fail_boot { InstanceState::Failed } else { InstanceState::Running };
        let instance = Instance {
            image: image.clone(),
            upcoming: vec![InstanceState::Booting, InstanceState::Booting, last],
            current: InstanceState::Launching,
        };
        let snapshot = Self::snapshot(id, &instance);
        self.instances.lock().unwrap().insert(id.clone(), instance);
        Ok(snapshot)
    }

    async fn update(&self, _ctx: &CancellationToken, _id: &EntityId, _image: &String) -> Result<EntityOf<Self>, CloudError> {
        Err(CloudError::Quota)
    }

    async fn forget(&self, _ctx: &CancellationToken, id: &EntityId) -> Result<EntityOf<Self>, CloudError> {
        let mut instances = self.instances.lock().unwrap();
        let instance = instances
            .get_mut(id)
            .ok_or_else(|| CloudError::NoSuchInstance(id.to_string()))?;
        instance.current = InstanceState::Stopping;
        instance.upcoming = vec![InstanceState::Stopping];
        Ok(Self::snapshot(id, instance))
    }

    fn convergence(&self, kind: OperationKind) -> Convergence<InstanceState> {
        match kind {
            OperationKind::Adopt | OperationKind::Update => {
                Convergence::to(InstanceState::Running, [InstanceState::Launching, InstanceState::Booting])
            }
            OperationKind::Forget => Convergence::to_absent([InstanceState::Running, InstanceState::Stopping]),
        }
    }
}

fn fast_policy() -> TransitionPolicy {
    TransitionPolicy::uniform(
        OperationPolicy::default()
            .with_mutate_budget(Duration::from_secs(20))
            .with_wait_timeout(Duration::from_secs(30))
            .with_not_found_grace(1),
    )
}

fn instance_id() -> EntityId {
    EntityId::new("eu-west", "i-0abc")
}

#[tokio::test(start_paused = true)]
async fn test_instance_full_lifecycle() {
    let orchestrator = LifecycleOrchestrator::new(FakeCloud::throttled(2)).with_policy(fast_policy());
    let ctx = CancellationToken::new();
    let id = instance_id();

    // Launch: two throttled attempts, each honouring the 2s retry-after hint
    let started = tokio::time::Instant::now();
    let running = orchestrator
        .transition(&ctx, &id, Operation::Adopt("debian-12".to_string()))
        .await
        .unwrap();
    assert_eq!(running.state, Observed::State(InstanceState::Running));
    assert_eq!(running.attributes, Some(InstanceInfo { image: "debian-12".into() }));
    assert!(started.elapsed() >= Duration::from_secs(4));

    // Launching again is a no-op
    let again = orchestrator
        .transition(&ctx, &id, Operation::Adopt("debian-12".to_string()))
        .await
        .unwrap();
    assert_eq!(again.state, Observed::State(InstanceState::Running));

    // Terminate and confirm it is gone
    let gone = orchestrator.transition(&ctx, &id, Operation::Forget).await.unwrap();
    assert!(gone.is_absent());

    // Terminating a missing instance is fine
    let gone_again = orchestrator.transition(&ctx, &id, Operation::Forget).await.unwrap();
    assert!(gone_again.is_absent());
}

#[tokio::test(start_paused = true)]
async fn test_failed_boot_is_unexpected_state() {
    let cloud = FakeCloud {
        fail_boot: true,
        ..FakeCloud::default()
    };
    let orchestrator = LifecycleOrchestrator::new(cloud).with_policy(fast_policy());

    let err = orchestrator
        .transition(&CancellationToken::new(), &instance_id(), Operation::Adopt("debian-12".into()))
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Wait);
    assert_eq!(err.kind(), FailureKind::Fatal);
    assert_eq!(err.operation(), OperationKind::Adopt);
    assert_eq!(err.last_state(), Some(Observed::State(InstanceState::Failed)));
    assert!(err.to_string().contains("adopt"));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_update_surfaces_backend_error() {
    let orchestrator = LifecycleOrchestrator::new(FakeCloud::default()).with_policy(fast_policy());

    let err = orchestrator
        .transition(&CancellationToken::new(), &instance_id(), Operation::Update("debian-13".into()))
        .await
        .unwrap_err();

    assert_eq!(err.phase(), Phase::Mutate);
    assert_eq!(err.kind(), FailureKind::Fatal);
    let source = std::error::Error::source(&err).expect("retry error");
    assert!(source.to_string().contains("quota"));
}

#[test]
fn test_classification_of_backend_errors() {
    assert_eq!(ErrorKind::of(&CloudError::Throttled), ErrorKind::Retryable);
    assert_eq!(ErrorKind::of(&CloudError::NoSuchInstance("i-1".into())), ErrorKind::Ignorable);
    assert_eq!(ErrorKind::of(&CloudError::Quota), ErrorKind::Fatal);

    let classified = classify(CloudError::Throttled).with_attempt(2);
    assert_eq!(classified.kind, ErrorKind::Retryable);
    assert_eq!(classified.retry_after, Some(Duration::from_secs(2)));
    assert_eq!(classified.attempt, Some(2));
}

// --- The waiter is not tied to adapters: wait for a local service to report ready ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Health {
    Starting,
    Ready,
}

impl ObservableState for Health {}

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
struct ConnectionRefused;

impl BackendError for ConnectionRefused {
    fn signal(&self) -> BackendSignal {
        BackendSignal::Busy { retry_after: None }
    }
}

struct HealthEndpoint {
    checks: Mutex<u32>,
}

#[async_trait]
impl StateProbe for HealthEndpoint {
    type State = Health;
    type Attributes = ();
    type Error = ConnectionRefused;

    async fn probe(&self, _ctx: &CancellationToken) -> Result<TrackedEntity<Health, ()>, ConnectionRefused> {
        let mut checks = self.checks.lock().unwrap();
        *checks += 1;
        let id = EntityId::new("local", "api");
        match *checks {
            1 | 2 => Err(ConnectionRefused),
            3 => Ok(TrackedEntity::present(id, Health::Starting, ())),
            _ => Ok(TrackedEntity::present(id, Health::Ready, ())),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_service_readiness() {
    let endpoint = HealthEndpoint { checks: Mutex::new(0) };
    let spec = WaitSpec::for_target(Health::Ready)
        .with_pending([Health::Starting])
        .with_poll_interval(Duration::from_millis(500))
        .with_timeout(Duration::from_secs(5));

    let ready = poll(&CancellationToken::new(), &endpoint, &spec).await.unwrap();

    assert_eq!(ready.state, Observed::State(Health::Ready));
    assert_eq!(*endpoint.checks.lock().unwrap(), 4);
}
