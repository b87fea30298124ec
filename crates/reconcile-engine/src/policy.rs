//! # Operation Policies
//!
//! Time budgets for each kind of transition. The defaults reflect how long a network
//! controller typically takes: adoption can take a couple of minutes while the device
//! provisions, updates and forgets settle within a minute.
//!
//! Policies are plain data and derive `serde` traits so an application can load them
//! from its own configuration file.

use crate::adapter::OperationKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Budgets for one operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationPolicy {
    /// Total time allowed for retrying the mutating call on transient errors.
    pub mutate_budget: Duration,
    /// Fixed delay between mutating-call attempts.
    pub mutate_backoff: Duration,
    /// Total time allowed for the convergence wait.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    /// Consecutive `Absent` observations tolerated before absence is meaningful.
    pub not_found_grace: u32,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self {
            mutate_budget: Duration::from_secs(30),
            mutate_backoff: Duration::from_secs(1),
            wait_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            not_found_grace: 3,
        }
    }
}

impl OperationPolicy {
    pub fn with_mutate_budget(mut self, budget: Duration) -> Self {
        self.mutate_budget = budget;
        self
    }

    pub fn with_mutate_backoff(mut self, backoff: Duration) -> Self {
        self.mutate_backoff = backoff;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
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
}

/// One [`OperationPolicy`] per operation kind.
///
/// When deserialized, each field a section leaves out keeps that operation's own
/// default, so overriding one adopt field never shortens the other adopt budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PolicyOverrides")]
pub struct TransitionPolicy {
    pub adopt: OperationPolicy,
    pub update: OperationPolicy,
    pub forget: OperationPolicy,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self {
            adopt: OperationPolicy::default()
                .with_mutate_budget(Duration::from_secs(60))
                .with_wait_timeout(Duration::from_secs(120)),
            update: OperationPolicy::default(),
            forget: OperationPolicy::default(),
        }
    }
}

impl TransitionPolicy {
    pub fn policy_for(&self, kind: OperationKind) -> &OperationPolicy {
        match kind {
            OperationKind::Adopt => &self.adopt,
            OperationKind::Update => &self.update,
            OperationKind::Forget => &self.forget,
        }
    }

    /// Apply the same policy to every operation kind. Handy for tests.
    pub fn uniform(policy: OperationPolicy) -> Self {
        Self {
            adopt: policy.clone(),
            update: policy.clone(),
            forget: policy,
        }
    }
}

/// Sparse form of [`TransitionPolicy`] as it appears in configuration files.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PolicyOverrides {
    adopt: OperationOverrides,
    update: OperationOverrides,
    forget: OperationOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OperationOverrides {
    mutate_budget: Option<Duration>,
    mutate_backoff: Option<Duration>,
    wait_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    not_found_grace: Option<u32>,
}

impl OperationOverrides {
    fn apply(self, base: OperationPolicy) -> OperationPolicy {
        OperationPolicy {
            mutate_budget: self.mutate_budget.unwrap_or(base.mutate_budget),
            mutate_backoff: self.mutate_backoff.unwrap_or(base.mutate_backoff),
            wait_timeout: self.wait_timeout.unwrap_or(base.wait_timeout),
            poll_interval: self.poll_interval.unwrap_or(base.poll_interval),
            not_found_grace: self.not_found_grace.unwrap_or(base.not_found_grace),
        }
    }
}

impl From<PolicyOverrides> for TransitionPolicy {
    fn from(overrides: PolicyOverrides) -> Self {
        let defaults = TransitionPolicy::default();
        Self {
            adopt: overrides.adopt.apply(defaults.adopt),
            update: overrides.update.apply(defaults.update),
            forget: overrides.forget.apply(defaults.forget),
        }
    }
}
