//! GeoDB object store.
//!
//! [`GeoDb`] wraps a transactional [`KvEngine`](geodb_kv::KvEngine) and a
//! [`Hub`](geodb_hub::Hub). Every write runs a proximity scan inside its own
//! transaction and publishes the written object and each proximity event to
//! the hub; streaming calls subscribe to the hub and forward filtered items
//! to a caller-provided [`StreamSink`].

pub mod config;
pub mod db;
pub mod error;
pub mod proximity;
pub mod stream;

pub use config::GeoDbConfig;
pub use db::{GeoDb, SetReport};
pub use error::{ServiceError, ServiceResult};
pub use stream::{StreamRequest, StreamSink};

// Re-export the data model
pub use geodb_types::{Event, Object, Point};
