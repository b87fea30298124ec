//! # Controller Client
//!
//! Cloneable handle to the [`ControllerActor`](super::ControllerActor). Each call sends a
//! request over the mpsc channel, awaits the JSON envelope on a oneshot channel, and
//! decodes it into typed results or a [`ControllerError`].
//!
//! The client is also the engine's [`ResourceAdapter`] for devices, which is what lets a
//! [`LifecycleOrchestrator`](reconcile_engine::LifecycleOrchestrator) drive them.

use super::message::{ControllerRequest, Reply};
use super::script::DeviceScript;
use crate::error::{ControllerError, ErrorCode};
use crate::model::{Device, DeviceConfig, DeviceState, ServiceState};
use async_trait::async_trait;
use reconcile_engine::{Convergence, EntityId, EntityOf, OperationKind, ResourceAdapter, TrackedEntity};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    meta: Meta,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    rc: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    retry_after: Option<u64>,
    #[serde(default)]
    up: Option<bool>,
}

impl Meta {
    fn into_error(self) -> ControllerError {
        let code = self
            .msg
            .as_deref()
            .unwrap_or("api.err.Unknown")
            .parse::<ErrorCode>()
            .unwrap_or_else(|never: Infallible| match never {});
        ControllerError::Api {
            code,
            message: self.detail.unwrap_or_default(),
            retry_after: self.retry_after.map(Duration::from_secs),
        }
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<Envelope<T>, ControllerError> {
    let envelope: Envelope<T> = serde_json::from_value(body)?;
    if envelope.meta.rc != "ok" {
        return Err(envelope.meta.into_error());
    }
    Ok(envelope)
}

fn decode_device(body: Value) -> Result<Device, ControllerError> {
    decode::<Device>(body)?
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ControllerError::api(ErrorCode::NotFound, "empty response"))
}

#[derive(Clone)]
pub struct ControllerClient {
    sender: mpsc::Sender<ControllerRequest>,
}

impl ControllerClient {
    pub fn new(sender: mpsc::Sender<ControllerRequest>) -> Self {
        Self { sender }
    }

    /// Send one request and await its envelope. Both the send and the reply race the
    /// token, so a stalled controller cannot hold a cancelled caller.
    async fn request(
        &self,
        ctx: &CancellationToken,
        build: impl FnOnce(Reply) -> ControllerRequest,
    ) -> Result<Value, ControllerError> {
        let (respond_to, response) = oneshot::channel();
        tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(ControllerError::Cancelled),
            sent = self.sender.send(build(respond_to)) => sent.map_err(|_| ControllerError::Closed)?,
        }
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!("Abandoning request on cancellation");
                Err(ControllerError::Cancelled)
            }
            reply = response => reply.map_err(|_| ControllerError::Dropped),
        }
    }

    /// One readiness read of the controller service.
    pub async fn status(&self, ctx: &CancellationToken) -> Result<ServiceState, ControllerError> {
        let body = self.request(ctx, |respond_to| ControllerRequest::Status { respond_to }).await?;
        let envelope = decode::<Value>(body)?;
        Ok(match envelope.meta.up {
            Some(true) => ServiceState::Ready,
            _ => ServiceState::Starting,
        })
    }

    #[instrument(level = "debug", skip(self, ctx, id), fields(device = %id))]
    pub async fn get_device(&self, ctx: &CancellationToken, id: &EntityId) -> Result<Device, ControllerError> {
        let id = id.clone();
        decode_device(self.request(ctx, |respond_to| ControllerRequest::Get { id, respond_to }).await?)
    }

    #[instrument(skip(self, ctx, id), fields(device = %id))]
    pub async fn adopt_device(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        config: DeviceConfig,
    ) -> Result<Device, ControllerError> {
        debug!("Sending adopt");
        let id = id.clone();
        decode_device(
            self.request(ctx, |respond_to| ControllerRequest::Adopt { id, config, respond_to })
                .await?,
        )
    }

    #[instrument(skip(self, ctx, id), fields(device = %id))]
    pub async fn update_device(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        config: DeviceConfig,
    ) -> Result<Device, ControllerError> {
        debug!("Sending update");
        let id = id.clone();
        decode_device(
            self.request(ctx, |respond_to| ControllerRequest::Update { id, config, respond_to })
                .await?,
        )
    }

    #[instrument(skip(self, ctx, id), fields(device = %id))]
    pub async fn forget_device(&self, ctx: &CancellationToken, id: &EntityId) -> Result<Device, ControllerError> {
        debug!("Sending forget");
        let id = id.clone();
        decode_device(self.request(ctx, |respond_to| ControllerRequest::Forget { id, respond_to }).await?)
    }

    /// Replace the simulated behaviour of one device.
    pub async fn script(&self, id: &EntityId, script: DeviceScript) -> Result<(), ControllerError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(ControllerRequest::Script {
                id: id.clone(),
                script,
                respond_to,
            })
            .await
            .map_err(|_| ControllerError::Closed)?;
        response.await.map_err(|_| ControllerError::Dropped)
    }

    fn tracked(id: &EntityId, device: Device) -> EntityOf<Self> {
        TrackedEntity::present(id.clone(), device.state(), device)
    }
}

#[async_trait]
impl ResourceAdapter for ControllerClient {
    type State = DeviceState;
    type Attributes = Device;
    type Payload = DeviceConfig;
    type Error = ControllerError;

    async fn read(&self, ctx: &CancellationToken, id: &EntityId) -> Result<EntityOf<Self>, ControllerError> {
        let device = self.get_device(ctx, id).await?;
        Ok(Self::tracked(id, device))
    }

    async fn adopt(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        config: &DeviceConfig,
    ) -> Result<EntityOf<Self>, ControllerError> {
        let device = self.adopt_device(ctx, id, config.clone()).await?;
        Ok(Self::tracked(id, device))
    }

    async fn update(
        &self,
        ctx: &CancellationToken,
        id: &EntityId,
        config: &DeviceConfig,
    ) -> Result<EntityOf<Self>, ControllerError> {
        let device = self.update_device(ctx, id, config.clone()).await?;
        Ok(Self::tracked(id, device))
    }

    async fn forget(&self, ctx: &CancellationToken, id: &EntityId) -> Result<EntityOf<Self>, ControllerError> {
        let device = self.forget_device(ctx, id).await?;
        Ok(Self::tracked(id, device))
    }

    fn convergence(&self, kind: OperationKind) -> Convergence<DeviceState> {
        use DeviceState::*;
        match kind {
            OperationKind::Adopt => Convergence::to(Connected, [Pending, Adopting, Provisioning, Upgrading]),
            OperationKind::Update => Convergence::to(Connected, [Provisioning, Upgrading]),
            OperationKind::Forget => Convergence::to_absent([Connected, Disconnected, Deleting, Pending, Provisioning]),
        }
    }
}
