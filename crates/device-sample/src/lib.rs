//! # Device Sample
//!
//! Network devices reconciled against a simulated controller with the
//! [`reconcile_engine`] crate.
//!
//! - **[controller]**: the simulated controller actor and its client, which is the
//!   engine's resource adapter for devices.
//! - **[model]**: [`DeviceState`](model::DeviceState), [`Device`](model::Device) and the
//!   controller's own [`ServiceState`](model::ServiceState).
//! - **[lifecycle]**: [`ControllerHarness`](lifecycle::ControllerHarness) to start, await
//!   and stop the controller.
//! - **[config]**: transition policy loaded from `RECONCILE_POLICY`.
//! - **[error]**: wire error codes and their classification.

pub mod config;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod model;
