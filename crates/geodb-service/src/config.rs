use serde::{Deserialize, Serialize};

/// Behaviour switches for [`GeoDb`](crate::GeoDb).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoDbConfig {
    /// Whether a write's proximity scan reports the written object against
    /// itself (distance 0).
    pub include_self_matches: bool,
}

impl Default for GeoDbConfig {
    fn default() -> Self {
        Self {
            include_self_matches: true,
        }
    }
}
