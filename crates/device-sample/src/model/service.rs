use reconcile_engine::ObservableState;
use serde::{Deserialize, Serialize};

/// Readiness of the controller service itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceState {
    Starting,
    Ready,
}

impl ObservableState for ServiceState {}
