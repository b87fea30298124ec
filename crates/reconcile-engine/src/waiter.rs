//! # State Convergence Waiter
//!
//! [`poll`] drives a [`StateProbe`] on a fixed interval until the entity reaches the
//! wait target, something fatal happens, the caller cancels, or the timeout elapses.
//!
//! ## Evaluation Order
//!
//! Each observation is judged in this order:
//!
//! 1. **Absent**: counted against [`WaitSpec::not_found_grace`]. Within grace the wait
//!    continues, absorbing entities that briefly vanish and reappear. Past grace, absence
//!    is either the success condition (`expect_presence == false`) or a fatal "not found".
//! 2. **Target**: success, returned immediately without a confirming re-probe.
//! 3. **Pending** (listed, or implicitly pending per [`ObservableState::is_transient`]):
//!    keep waiting, and reset the not-found counter since the entity was seen.
//! 4. **Anything else**: fatal "unexpected state", returned at once rather than burning
//!    the rest of the timeout.
//!
//! ## Absence Thresholds
//!
//! When absence is a failure it becomes fatal once the counter *exceeds* the grace.
//! When absence is the goal it is accepted once the counter *reaches* the grace (at
//! least one observation), so a grace of 3 means "three consecutive absent reads".
//!
//! ## Cancellation
//!
//! The token is checked before every probe and raced against every inter-tick sleep.
//! An in-flight probe is not interrupted; the probe receives the same token.

use crate::classify::{BackendError, ErrorKind};
use crate::error::{SpecError, WaitError};
use crate::probe::StateProbe;
use crate::state::{ObservableState, Observed, TrackedEntity};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Parameters of one convergence wait.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSpec<S> {
    /// State that ends the wait successfully. `None` for waits only absence can satisfy.
    pub target: Option<S>,
    /// In-flight states that are fine to keep waiting on. Must not contain `target`.
    pub pending: Vec<S>,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub not_found_grace: u32,
    /// `true` when absence is a failure, `false` when absence is the success condition.
    pub expect_presence: bool,
}

impl<S: ObservableState> WaitSpec<S> {
    /// Wait for the entity to reach `target`.
    pub fn for_target(target: S) -> Self {
        Self {
            target: Some(target),
            pending: Vec::new(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            not_found_grace: 0,
            expect_presence: true,
        }
    }

    /// Wait for the entity to disappear.
    pub fn for_absence() -> Self {
        Self {
            target: None,
            pending: Vec::new(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            not_found_grace: 0,
            expect_presence: false,
        }
    }

    pub fn with_pending(mut self, pending: impl IntoIterator<Item = S>) -> Self {
        self.pending = pending.into_iter().collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_not_found_grace(mut self, grace: u32) -> Self {
        self.not_found_grace = grace;
        self
    }

    pub fn with_expect_presence(mut self, expect_presence: bool) -> Self {
        self.expect_presence = expect_presence;
        self
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        if self.poll_interval.is_zero() {
            return Err(SpecError::ZeroPollInterval);
        }
        match &self.target {
            Some(target) if self.pending.contains(target) => {
                Err(SpecError::TargetIsPending(format!("{target:?}")))
            }
            None if self.expect_presence => Err(SpecError::NoTerminalCondition),
            _ => Ok(()),
        }
    }

    fn is_pending(&self, state: &S) -> bool {
        self.pending.contains(state) || state.is_transient()
    }

    fn evaluate(&self, observed: &Observed<S>, not_found: &mut u32) -> Verdict<S> {
        let state = match observed {
            Observed::Absent => {
                *not_found = not_found.saturating_add(1);
                return if self.expect_presence {
                    if *not_found > self.not_found_grace {
                        Verdict::Missing
                    } else {
                        Verdict::Continue
                    }
                } else if *not_found >= self.not_found_grace.max(1) {
                    Verdict::Gone
                } else {
                    Verdict::Continue
                };
            }
            Observed::State(state) => state,
        };

        if self.target.as_ref() == Some(state) {
            Verdict::Converged
        } else if self.is_pending(state) {
            *not_found = 0;
            Verdict::Continue
        } else {
            Verdict::Unexpected(state.clone())
        }
    }
}

enum Verdict<S> {
    Converged,
    Gone,
    Continue,
    Missing,
    Unexpected(S),
}

/// Poll `probe` until it satisfies `spec`.
///
/// Returns the converged snapshot, or a synthetic absent snapshot when absence was the
/// goal. The not-found counter lives only for the duration of this call.
#[instrument(level = "debug", skip_all, fields(target = ?spec.target, expect_presence = spec.expect_presence))]
pub async fn poll<P: StateProbe>(
    ctx: &CancellationToken,
    probe: &P,
    spec: &WaitSpec<P::State>,
) -> Result<TrackedEntity<P::State, P::Attributes>, WaitError<P::State, P::Error>> {
    spec.validate()?;

    let started = Instant::now();
    let mut not_found = 0u32;
    let mut probes = 0u32;
    let mut last_state: Option<Observed<P::State>> = None;

    loop {
        if ctx.is_cancelled() {
            debug!(probes, "Cancelled before probe");
            return Err(WaitError::Cancelled {
                last_state,
                elapsed: started.elapsed(),
            });
        }
        if started.elapsed() >= spec.timeout {
            warn!(probes, last_state = ?last_state, elapsed = ?started.elapsed(), "Wait timed out");
            return Err(WaitError::Timeout {
                last_state,
                elapsed: started.elapsed(),
            });
        }

        probes = probes.saturating_add(1);
        match probe.probe(ctx).await {
            Ok(entity) => {
                debug!(probes, state = %entity.state, not_found, "Observed");
                last_state = Some(entity.state.clone());

                match spec.evaluate(&entity.state, &mut not_found) {
                    Verdict::Converged => {
                        info!(probes, state = %entity.state, elapsed = ?started.elapsed(), "Converged");
                        return Ok(entity);
                    }
                    Verdict::Gone => {
                        info!(probes, not_found, elapsed = ?started.elapsed(), "Converged to absent");
                        return Ok(TrackedEntity::absent(entity.id));
                    }
                    Verdict::Missing => {
                        warn!(probes, not_found, "Entity not found");
                        return Err(WaitError::NotFound {
                            observations: not_found,
                            elapsed: started.elapsed(),
                        });
                    }
                    Verdict::Unexpected(state) => {
                        warn!(probes, state = ?state, "Unexpected state");
                        return Err(WaitError::UnexpectedState {
                            state,
                            elapsed: started.elapsed(),
                        });
                    }
                    Verdict::Continue => {}
                }
            }
            Err(e) => {
                if let Some(source) = absorb_probe_error(e, probes) {
                    // A probe aborted by the token is a cancellation, not a backend failure
                    if ctx.is_cancelled() {
                        return Err(WaitError::Cancelled {
                            last_state,
                            elapsed: started.elapsed(),
                        });
                    }
                    return Err(WaitError::Probe {
                        source,
                        last_state,
                        elapsed: started.elapsed(),
                    });
                }
            }
        }

        let remaining = spec.timeout.saturating_sub(started.elapsed());
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!(probes, "Cancelled while sleeping");
                return Err(WaitError::Cancelled {
                    last_state,
                    elapsed: started.elapsed(),
                });
            }
            _ = tokio::time::sleep(spec.poll_interval.min(remaining)) => {}
        }
    }
}

/// Returns the error back when it must end the wait.
fn absorb_probe_error<E: BackendError>(e: E, probes: u32) -> Option<E> {
    match ErrorKind::of(&e) {
        ErrorKind::Fatal => {
            warn!(probes, error = %e, "Probe failed");
            Some(e)
        }
        kind => {
            debug!(probes, %kind, error = %e, "Probe error, no new information this tick");
            None
        }
    }
}
