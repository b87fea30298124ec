//! # Mock Backends & Testing Guide
//!
//! Convergence logic is all about *sequences*: what the backend says on the first read,
//! the second, the fifth. The doubles here let a test script those sequences exactly and
//! then count how many calls the engine made.
//!
//! | Double | Stands in for | Use it to test |
//! |--------|---------------|----------------|
//! | [`ScriptedProbe`] | any [`StateProbe`] | the waiter alone |
//! | [`MockAdapter`] | a [`ResourceAdapter`] | the orchestrator end to end |
//!
//! Both speak the small [`TestState`] / [`MockError`] vocabulary, modelled on a network
//! controller's device states.
//!
//! ## Scripting a Probe
//!
//! ```rust
//! use reconcile_engine::mock::{ScriptedProbe, TestState};
//! use reconcile_engine::{poll, WaitSpec};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let probe = ScriptedProbe::from_states([TestState::Adopting, TestState::Connected]);
//!     let spec = WaitSpec::for_target(TestState::Connected)
//!         .with_pending([TestState::Adopting])
//!         .with_poll_interval(Duration::from_millis(10));
//!
//!     let entity = poll(&CancellationToken::new(), &probe, &spec).await.unwrap();
//!     assert!(!entity.is_absent());
//!     assert_eq!(probe.calls(), 2);
//! }
//! ```
//!
//! When a script runs out, the last step repeats, so a script of `[Adopting]` reports
//! `Adopting` forever.
//!
//! ## Expectations on an Adapter
//!
//! [`MockAdapter`] follows the expectation-builder style: queue a response per call,
//! run the code under test, then [`verify`](MockAdapter::verify) that every queued
//! mutating call was consumed.
//!
//! ```rust
//! use reconcile_engine::mock::{MockAdapter, MockError, TestState};
//!
//! let adapter = MockAdapter::new();
//! adapter.expect_adopt().return_err(MockError::Busy);
//! adapter.expect_adopt().return_ok(TestState::Adopting);
//! adapter.expect_read().return_state(TestState::Connected);
//! ```

use crate::adapter::{Convergence, OperationKind, ResourceAdapter};
use crate::classify::{BackendError, BackendSignal};
use crate::probe::StateProbe;
use crate::state::{EntityId, ObservableState, TrackedEntity};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Device-like states used by the test doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    Unknown,
    Pending,
    Adopting,
    Provisioning,
    Connected,
    Deleting,
    Disconnected,
}

impl ObservableState for TestState {
    fn is_transient(&self) -> bool {
        matches!(self, TestState::Unknown)
    }
}

/// Errors the test doubles can be scripted to return.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MockError {
    #[error("resource busy")]
    Busy,
    #[error("resource busy, retry after {0:?}")]
    BusyFor(Duration),
    #[error("not found")]
    NotFound,
    #[error("rejected: {0}")]
    Rejected(String),
}

impl BackendError for MockError {
    fn signal(&self) -> BackendSignal {
        match self {
            MockError::Busy => BackendSignal::Busy { retry_after: None },
            MockError::BusyFor(hint) => BackendSignal::Busy {
                retry_after: Some(*hint),
            },
            MockError::NotFound => BackendSignal::NotFound,
            MockError::Rejected(_) => BackendSignal::Other,
        }
    }
}

pub type MockEntity = TrackedEntity<TestState, ()>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn default_id() -> EntityId {
    EntityId::new("default", "00:00:00:00:00:01")
}

// =============================================================================
// SCRIPTED PROBE
// =============================================================================

#[derive(Debug, Clone)]
enum Step {
    State(TestState),
    Absent,
    Error(MockError),
}

/// A [`StateProbe`] that replays a fixed script of observations.
pub struct ScriptedProbe {
    id: EntityId,
    script: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    calls: AtomicU32,
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            id: default_id(),
            script: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            calls: AtomicU32::new(0),
        }
    }

    pub fn from_states(states: impl IntoIterator<Item = TestState>) -> Self {
        states
            .into_iter()
            .fold(Self::new(), |probe, state| probe.then_state(state))
    }

    pub fn then_state(self, state: TestState) -> Self {
        lock(&self.script).push_back(Step::State(state));
        self
    }

    /// Report the entity as not found `times` times in a row.
    pub fn then_absent(self, times: u32) -> Self {
        lock(&self.script).extend((0..times).map(|_| Step::Absent));
        self
    }

    pub fn then_error(self, error: MockError) -> Self {
        lock(&self.script).push_back(Step::Error(error));
        self
    }

    /// Number of probes performed so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Option<Step> {
        let next = lock(&self.script).pop_front();
        let mut last = lock(&self.last);
        match next {
            Some(step) => {
                *last = Some(step.clone());
                Some(step)
            }
            None => last.clone(),
        }
    }
}

#[async_trait]
impl StateProbe for ScriptedProbe {
    type State = TestState;
    type Attributes = ();
    type Error = MockError;

    async fn probe(&self, _ctx: &CancellationToken) -> Result<MockEntity, MockError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Some(Step::State(state)) => Ok(TrackedEntity::present(self.id.clone(), state, ())),
            Some(Step::Absent) => Ok(TrackedEntity::absent(self.id.clone())),
            Some(Step::Error(e)) => Err(e),
            None => Err(MockError::Rejected("probe script is empty".into())),
        }
    }
}

// =============================================================================
// MOCK ADAPTER
// =============================================================================

/// A [`ResourceAdapter`] answering from queued expectations.
///
/// Reads repeat their last queued answer once the queue is drained. Mutating calls
/// without a queued answer fail with [`MockError::Rejected`] and make
/// [`verify`](MockAdapter::verify) panic.
#[derive(Default)]
pub struct MockAdapter {
    reads: Mutex<VecDeque<Result<TestState, MockError>>>,
    last_read: Mutex<Option<Result<TestState, MockError>>>,
    adopts: Mutex<VecDeque<Result<TestState, MockError>>>,
    updates: Mutex<VecDeque<Result<TestState, MockError>>>,
    forgets: Mutex<VecDeque<Result<TestState, MockError>>>,
    read_calls: AtomicU32,
    adopt_calls: AtomicU32,
    update_calls: AtomicU32,
    forget_calls: AtomicU32,
    unexpected: AtomicU32,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_read(&self) -> ReadExpectationBuilder<'_> {
        ReadExpectationBuilder { queue: &self.reads }
    }

    pub fn expect_adopt(&self) -> MutateExpectationBuilder<'_> {
        MutateExpectationBuilder { queue: &self.adopts }
    }

    pub fn expect_update(&self) -> MutateExpectationBuilder<'_> {
        MutateExpectationBuilder { queue: &self.updates }
    }

    pub fn expect_forget(&self) -> MutateExpectationBuilder<'_> {
        MutateExpectationBuilder { queue: &self.forgets }
    }

    pub fn read_calls(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Number of mutating calls made for one operation kind.
    pub fn mutate_calls(&self, kind: OperationKind) -> u32 {
        match kind {
            OperationKind::Adopt => self.adopt_calls.load(Ordering::SeqCst),
            OperationKind::Update => self.update_calls.load(Ordering::SeqCst),
            OperationKind::Forget => self.forget_calls.load(Ordering::SeqCst),
        }
    }

    /// Verifies that every queued mutating call was consumed and none was unexpected.
    pub fn verify(&self) {
        let remaining = lock(&self.adopts).len() + lock(&self.updates).len() + lock(&self.forgets).len();
        if remaining != 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
        let unexpected = self.unexpected.load(Ordering::SeqCst);
        if unexpected != 0 {
            panic!("{} unexpected mutating calls", unexpected);
        }
    }

    fn answer(
        &self,
        queue: &Mutex<VecDeque<Result<TestState, MockError>>>,
        counter: &AtomicU32,
        id: &EntityId,
    ) -> Result<MockEntity, MockError> {
        counter.fetch_add(1, Ordering::SeqCst);
        match lock(queue).pop_front() {
            Some(response) => response.map(|state| TrackedEntity::present(id.clone(), state, ())),
            None => {
                self.unexpected.fetch_add(1, Ordering::SeqCst);
                Err(MockError::Rejected("no expectation queued".into()))
            }
        }
    }
}

#[async_trait]
impl ResourceAdapter for MockAdapter {
    type State = TestState;
    type Attributes = ();
    type Payload = String;
    type Error = MockError;

    async fn read(&self, _ctx: &CancellationToken, id: &EntityId) -> Result<MockEntity, MockError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.reads).pop_front();
        let mut last = lock(&self.last_read);
        let response = match next {
            Some(response) => {
                *last = Some(response.clone());
                response
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(MockError::Rejected("no read queued".into()))),
        };
        response.map(|state| TrackedEntity::present(id.clone(), state, ()))
    }

    async fn adopt(&self, _ctx: &CancellationToken, id: &EntityId, _payload: &String) -> Result<MockEntity, MockError> {
        self.answer(&self.adopts, &self.adopt_calls, id)
    }

    async fn update(&self, _ctx: &CancellationToken, id: &EntityId, _payload: &String) -> Result<MockEntity, MockError> {
        self.answer(&self.updates, &self.update_calls, id)
    }

    async fn forget(&self, _ctx: &CancellationToken, id: &EntityId) -> Result<MockEntity, MockError> {
        self.answer(&self.forgets, &self.forget_calls, id)
    }

    fn convergence(&self, kind: OperationKind) -> Convergence<TestState> {
        match kind {
            OperationKind::Adopt => Convergence::to(
                TestState::Connected,
                [TestState::Pending, TestState::Adopting, TestState::Provisioning],
            ),
            OperationKind::Update => Convergence::to(TestState::Connected, [TestState::Provisioning]),
            OperationKind::Forget => Convergence::to_absent([TestState::Connected, TestState::Deleting]),
        }
    }
}

/// Builder for read expectations.
pub struct ReadExpectationBuilder<'a> {
    queue: &'a Mutex<VecDeque<Result<TestState, MockError>>>,
}

impl ReadExpectationBuilder<'_> {
    pub fn return_state(self, state: TestState) {
        lock(self.queue).push_back(Ok(state));
    }

    /// Answer "not found", which a probe turns into `Absent`.
    pub fn return_absent(self) {
        lock(self.queue).push_back(Err(MockError::NotFound));
    }

    pub fn return_err(self, error: MockError) {
        lock(self.queue).push_back(Err(error));
    }
}

/// Builder for adopt, update and forget expectations.
pub struct MutateExpectationBuilder<'a> {
    queue: &'a Mutex<VecDeque<Result<TestState, MockError>>>,
}

impl MutateExpectationBuilder<'_> {
    /// Succeed, reporting the entity in `state`.
    pub fn return_ok(self, state: TestState) {
        lock(self.queue).push_back(Ok(state));
    }

    pub fn return_err(self, error: MockError) {
        lock(self.queue).push_back(Err(error));
    }
}
