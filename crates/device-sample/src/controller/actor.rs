//! # Simulated Controller
//!
//! The actor owns every device record and processes requests one at a time, so the
//! store needs no locks. It behaves like an eventually-consistent controller:
//!
//! - a mutating call is accepted immediately, its effect shows up over later reads;
//! - devices can be scripted to answer "busy" or to vanish from reads for a while;
//! - while the service is still booting, device requests get `api.err.ServiceUnavailable`.

use super::message::ControllerRequest;
use super::script::DeviceScript;
use crate::error::ErrorCode;
use crate::model::{Device, DeviceConfig, DeviceState};
use reconcile_engine::EntityId;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct SimDevice {
    device: Device,
    upcoming: VecDeque<DeviceState>,
    flicker: u32,
    removing: bool,
}

pub struct ControllerActor {
    receiver: mpsc::Receiver<ControllerRequest>,
    devices: HashMap<EntityId, SimDevice>,
    scripts: HashMap<EntityId, DeviceScript>,
    /// Status reads still answered with "not up".
    boot_reads: u32,
}

impl ControllerActor {
    pub fn new(receiver: mpsc::Receiver<ControllerRequest>, boot_reads: u32) -> Self {
        Self {
            receiver,
            devices: HashMap::new(),
            scripts: HashMap::new(),
            boot_reads,
        }
    }

    /// Process requests until every client is dropped or `shutdown` fires.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(boot_reads = self.boot_reads, "Controller started");

        loop {
            let msg = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                msg = self.receiver.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };
            self.handle(msg);
        }

        info!(devices = self.devices.len(), "Controller shutdown");
    }

    fn handle(&mut self, msg: ControllerRequest) {
        match msg {
            ControllerRequest::Status { respond_to } => {
                let up = self.boot_reads == 0;
                self.boot_reads = self.boot_reads.saturating_sub(1);
                debug!(up, "Status");
                let _ = respond_to.send(json!({ "meta": { "rc": "ok", "up": up }, "data": [] }));
            }
            ControllerRequest::Script {
                id,
                script,
                respond_to,
            } => {
                debug!(%id, ?script, "Script");
                self.scripts.insert(id, script);
                let _ = respond_to.send(());
            }
            ControllerRequest::Get { id, respond_to } => {
                let _ = respond_to.send(self.booting().unwrap_or_else(|| self.get(&id)));
            }
            ControllerRequest::Adopt {
                id,
                config,
                respond_to,
            } => {
                let _ = respond_to.send(self.booting().unwrap_or_else(|| self.adopt(id, config)));
            }
            ControllerRequest::Update {
                id,
                config,
                respond_to,
            } => {
                let _ = respond_to.send(self.booting().unwrap_or_else(|| self.update(&id, config)));
            }
            ControllerRequest::Forget { id, respond_to } => {
                let _ = respond_to.send(self.booting().unwrap_or_else(|| self.forget(&id)));
            }
        }
    }

    fn booting(&self) -> Option<Value> {
        (self.boot_reads > 0).then(|| error_body(ErrorCode::ServiceUnavailable, "controller is starting", None))
    }

    fn script(&self, id: &EntityId) -> DeviceScript {
        self.scripts.get(id).cloned().unwrap_or_default()
    }

    /// Consumes one scripted busy answer, if any are left.
    fn busy(&mut self, id: &EntityId) -> Option<Value> {
        let script = self.scripts.get_mut(id)?;
        if script.busy == 0 {
            return None;
        }
        script.busy -= 1;
        warn!(%id, remaining = script.busy, "Busy");
        Some(error_body(ErrorCode::DeviceBusy, "device is busy", script.busy_retry_after))
    }

    fn get(&mut self, id: &EntityId) -> Value {
        let Some(sim) = self.devices.get_mut(id) else {
            return not_found(id);
        };
        if sim.flicker > 0 {
            sim.flicker -= 1;
            debug!(%id, remaining = sim.flicker, "Flicker");
            return not_found(id);
        }
        match sim.upcoming.pop_front() {
            Some(next) => sim.device.state_code = next.code(),
            None if sim.removing => {
                self.devices.remove(id);
                info!(%id, size = self.devices.len(), "Removed");
                return not_found(id);
            }
            None => {}
        }
        debug!(%id, state = %sim.device.state(), "Get");
        ok_body(&sim.device)
    }

    fn adopt(&mut self, id: EntityId, config: DeviceConfig) -> Value {
        if let Some(busy) = self.busy(&id) {
            return busy;
        }
        if let Some(sim) = self.devices.get(&id).filter(|sim| !sim.removing) {
            debug!(%id, state = %sim.device.state(), "Already adopted");
            return ok_body(&sim.device);
        }

        let script = self.script(&id);
        let device = Device {
            mac: id.key.clone(),
            site: id.scope.clone(),
            name: config.name,
            model: script.model,
            port_profile: config.port_profile,
            state_code: DeviceState::Pending.code(),
        };
        let body = ok_body(&device);
        self.devices.insert(
            id.clone(),
            SimDevice {
                device,
                upcoming: script.adopt.into(),
                flicker: script.flicker,
                removing: false,
            },
        );
        info!(%id, size = self.devices.len(), "Adopted");
        body
    }

    fn update(&mut self, id: &EntityId, config: DeviceConfig) -> Value {
        if !self.devices.contains_key(id) {
            return not_found(id);
        }
        if let Some(busy) = self.busy(id) {
            return busy;
        }
        let script = self.script(id);
        let Some(sim) = self.devices.get_mut(id) else {
            return not_found(id);
        };
        if config.name.is_some() {
            sim.device.name = config.name;
        }
        if config.port_profile.is_some() {
            sim.device.port_profile = config.port_profile;
        }
        sim.upcoming = script.update.into();
        sim.flicker = script.flicker;
        info!(%id, "Updated");
        ok_body(&sim.device)
    }

    fn forget(&mut self, id: &EntityId) -> Value {
        if !self.devices.contains_key(id) {
            return not_found(id);
        }
        if let Some(busy) = self.busy(id) {
            return busy;
        }
        let script = self.script(id);
        let Some(sim) = self.devices.get_mut(id) else {
            return not_found(id);
        };
        sim.device.state_code = DeviceState::Deleting.code();
        sim.upcoming = script.forget.into();
        sim.removing = true;
        info!(%id, "Forgetting");
        ok_body(&sim.device)
    }
}

fn ok_body(device: &Device) -> Value {
    json!({ "meta": { "rc": "ok" }, "data": [device] })
}

fn not_found(id: &EntityId) -> Value {
    error_body(ErrorCode::NotFound, &format!("unknown device {id}"), None)
}

fn error_body(code: ErrorCode, detail: &str, retry_after: Option<Duration>) -> Value {
    json!({
        "meta": {
            "rc": "error",
            "msg": code.as_wire(),
            "detail": detail,
            "retry_after": retry_after.map(|d| d.as_secs()),
        },
        "data": [],
    })
}
