//! Broadcast hub for GeoDB.
//!
//! Writers publish objects and proximity events into per-kind ingress
//! queues; one dispatch loop per kind fans every item out to the delivery
//! channel of each registered streaming client.
//!
//! Each [`Hub`] owns its queues and client tables, so independent instances
//! never see each other's traffic.

pub mod config;
pub mod error;
pub mod hub;
pub mod topic;

pub use config::{HubConfig, OverflowPolicy};
pub use error::{HubError, HubResult};
pub use hub::{DispatchHandle, Hub};
pub use topic::{ClientStream, Topic};
