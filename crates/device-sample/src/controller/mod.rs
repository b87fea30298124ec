//! # Controller
//!
//! A simulated network controller, built as an actor:
//!
//! - [`ControllerActor`] owns the device store and answers requests sequentially.
//! - [`ControllerClient`] is the cloneable handle, and the engine's resource adapter.
//! - [`DeviceScript`] controls per-device behaviour (progressions, busy answers, flicker).
//!
//! ## Usage
//!
//! ```rust
//! use device_sample::controller::{self, DeviceScript};
//! use device_sample::model::DeviceConfig;
//! use reconcile_engine::EntityId;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (actor, client) = controller::new(0);
//!     tokio::spawn(actor.run(CancellationToken::new()));
//!
//!     let ctx = CancellationToken::new();
//!     let id = EntityId::new("default", "aa:bb:cc:dd:ee:ff");
//!     client.script(&id, DeviceScript::default().with_busy(1)).await?;
//!
//!     // First attempt is answered with api.err.DeviceBusy
//!     assert!(client.adopt_device(&ctx, &id, DeviceConfig::named("lobby-ap")).await.is_err());
//!     let device = client.adopt_device(&ctx, &id, DeviceConfig::named("lobby-ap")).await?;
//!     assert_eq!(device.name.as_deref(), Some("lobby-ap"));
//!     Ok(())
//! }
//! ```

pub mod actor;
pub mod client;
pub mod message;
pub mod script;

pub use actor::ControllerActor;
pub use client::ControllerClient;
pub use message::ControllerRequest;
pub use script::DeviceScript;

use tokio::sync::mpsc;

/// Creates a controller actor and its client. The controller answers `boot_reads`
/// status reads with "not up" before reporting ready.
pub fn new(boot_reads: u32) -> (ControllerActor, ControllerClient) {
    let (sender, receiver) = mpsc::channel(32);
    (ControllerActor::new(receiver, boot_reads), ControllerClient::new(sender))
}
