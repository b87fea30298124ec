//! # Observable State & Tracked Entities
//!
//! The engine never interprets domain states itself. It only needs to compare them
//! against a target, test membership in a pending set, and recognise "first observation
//! noise" such as `Unknown`. The [`ObservableState`] trait is that capability.
//!
//! On top of the domain value the engine reserves one sentinel of its own,
//! [`Observed::Absent`], meaning the entity was not observed by a probe. Keeping the
//! sentinel outside the domain enum means no resource type has to invent a fake
//! "missing" variant.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display};

/// Capability required of any domain state value the engine drives.
///
/// # Implicitly Pending States
/// Some backends report a placeholder (`Unknown`, `Initializing`) on the very first
/// read after a mutation. Those states return `true` from [`is_transient`] and are
/// treated as pending by the waiter even when the caller did not list them, unless
/// the caller names one explicitly as the wait target.
///
/// [`is_transient`]: ObservableState::is_transient
pub trait ObservableState: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Whether this value is first-observation noise rather than a meaningful state.
    fn is_transient(&self) -> bool {
        false
    }
}

/// What a single probe saw: a domain state, or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Observed<S> {
    /// The entity was not observed (the backend answered "not found").
    Absent,
    /// The entity was observed in this state.
    State(S),
}

impl<S> Observed<S> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Observed::Absent)
    }

    /// The domain state, if the entity was present.
    pub fn state(&self) -> Option<&S> {
        match self {
            Observed::Absent => None,
            Observed::State(s) => Some(s),
        }
    }
}

impl<S: Debug> Display for Observed<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Absent => write!(f, "Absent"),
            Observed::State(s) => write!(f, "{s:?}"),
        }
    }
}

/// Identity of a remote entity: a scoping key plus a natural key.
///
/// For a network device this is the site and the hardware address; for a backing
/// service it might be a deployment name and a service name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub scope: String,
    pub key: String,
}

impl EntityId {
    pub fn new(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
        }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.key)
    }
}

/// A fresh snapshot of a remote entity, rebuilt on every probe.
///
/// `attributes` holds the raw backend payload and is `None` whenever the entity was
/// not observed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntity<S, A> {
    pub id: EntityId,
    pub state: Observed<S>,
    pub attributes: Option<A>,
}

impl<S, A> TrackedEntity<S, A> {
    pub fn present(id: EntityId, state: S, attributes: A) -> Self {
        Self {
            id,
            state: Observed::State(state),
            attributes: Some(attributes),
        }
    }

    /// Synthetic snapshot describing an entity that was not observed.
    pub fn absent(id: EntityId) -> Self {
        Self {
            id,
            state: Observed::Absent,
            attributes: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.state.is_absent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Light {
        Unknown,
        On,
    }

    impl ObservableState for Light {
        fn is_transient(&self) -> bool {
            matches!(self, Light::Unknown)
        }
    }

    #[test]
    fn absent_snapshot_carries_no_attributes() {
        let entity: TrackedEntity<Light, String> = TrackedEntity::absent(EntityId::new("default", "aa:bb"));
        assert!(entity.is_absent());
        assert!(entity.attributes.is_none());
        assert_eq!(entity.state.state(), None);
    }

    #[test]
    fn present_snapshot_exposes_state() {
        let entity = TrackedEntity::present(EntityId::new("default", "aa:bb"), Light::On, "raw".to_string());
        assert_eq!(entity.state.state(), Some(&Light::On));
        assert!(!Light::On.is_transient());
        assert!(Light::Unknown.is_transient());
    }

    #[test]
    fn display_formats() {
        assert_eq!(EntityId::new("default", "aa:bb").to_string(), "default/aa:bb");
        assert_eq!(Observed::<Light>::Absent.to_string(), "Absent");
        assert_eq!(Observed::State(Light::On).to_string(), "On");
    }
}
