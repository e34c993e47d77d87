use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::point::Point;

/// A stored, geolocated entity with a radius of influence.
///
/// The `key` doubles as the store key. Copies handed to subscribers are
/// snapshots; the store owns the authoritative record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Unique identifier, stamped from the map key on write.
    #[serde(default)]
    pub key: String,
    /// Position; objects without one never take part in proximity checks.
    #[serde(default)]
    pub point: Option<Point>,
    /// Radius of influence in metres.
    #[serde(default)]
    pub radius: f64,
    /// Caller payload.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Seconds since epoch; filled with the write time when zero.
    #[serde(default)]
    pub updated_unix: i64,
    /// Absolute expiry in seconds since epoch; zero means never.
    #[serde(default)]
    pub expires_unix: i64,
}

impl Object {
    pub fn new(key: impl Into<String>, point: Point, radius: f64) -> Self {
        Self {
            key: key.into(),
            point: Some(point),
            radius,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    pub fn with_expires_unix(mut self, expires_unix: i64) -> Self {
        self.expires_unix = expires_unix;
        self
    }

    pub fn with_updated_unix(mut self, updated_unix: i64) -> Self {
        self.updated_unix = updated_unix;
        self
    }

    /// Stamp the store key and default `updated_unix` to `now` when unset.
    pub fn stamp(&mut self, key: &str, now: i64) {
        self.key = key.to_string();
        if self.updated_unix == 0 {
            self.updated_unix = now;
        }
    }

    /// Check the invariants a stored object must hold.
    pub fn validate(&self) -> TypeResult<()> {
        if self.key.is_empty() {
            return Err(TypeError::EmptyKey);
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(TypeError::InvalidRadius(self.radius));
        }
        if let Some(point) = &self.point {
            point.validate()?;
        }
        Ok(())
    }

    /// Expiry in the engine's unsigned representation (0 = never).
    pub fn expires_at(&self) -> u64 {
        self.expires_unix.max(0) as u64
    }

    /// Great-circle distance to `other` if both objects carry a point.
    pub fn distance_to(&self, other: &Object) -> Option<f64> {
        match (&self.point, &other.point) {
            (Some(a), Some(b)) => Some(a.distance_to(b)),
            _ => None,
        }
    }

    /// Serialize for storage.
    pub fn encode(&self) -> TypeResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Deserialize a stored value.
    pub fn decode(bytes: &[u8]) -> TypeResult<Self> {
        bincode::deserialize(bytes).map_err(|e| TypeError::Deserialization(e.to_string()))
    }
}
