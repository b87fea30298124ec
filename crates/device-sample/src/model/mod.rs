//! # Domain Model
//!
//! Plain data types shared by the controller simulation, its client and the harness.

pub mod device;
pub mod service;

pub use device::*;
pub use service::*;
