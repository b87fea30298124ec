//! Requests understood by the [`ControllerActor`](super::ControllerActor).
//!
//! Every device request is answered with the controller's JSON response envelope,
//! exactly as a real controller would put it on the wire:
//!
//! ```text
//! {"meta": {"rc": "ok"}, "data": [{"mac": "...", "site": "default", "state": 1, ...}]}
//! {"meta": {"rc": "error", "msg": "api.err.DeviceBusy", "retry_after": 2}, "data": []}
//! ```

use super::script::DeviceScript;
use crate::model::DeviceConfig;
use reconcile_engine::EntityId;
use serde_json::Value;
use tokio::sync::oneshot;

/// One-shot channel carrying a response envelope back to the client.
pub type Reply = oneshot::Sender<Value>;

#[derive(Debug)]
pub enum ControllerRequest {
    Status {
        respond_to: Reply,
    },
    Get {
        id: EntityId,
        respond_to: Reply,
    },
    Adopt {
        id: EntityId,
        config: DeviceConfig,
        respond_to: Reply,
    },
    Update {
        id: EntityId,
        config: DeviceConfig,
        respond_to: Reply,
    },
    Forget {
        id: EntityId,
        respond_to: Reply,
    },
    /// Test hook: replace the behaviour script of one device.
    Script {
        id: EntityId,
        script: DeviceScript,
        respond_to: oneshot::Sender<()>,
    },
}
