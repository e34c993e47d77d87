use serde::{Deserialize, Serialize};

/// A key-value entry with its metadata tag and expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// One-byte record tag, opaque to the engine.
    pub meta: u8,
    /// Absolute expiry in seconds since epoch; zero means never.
    pub expires_at: u64,
}

impl Entry {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            meta: 0,
            expires_at: 0,
        }
    }

    pub fn with_meta(mut self, meta: u8) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_expires_at(mut self, expires_at: u64) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at != 0 && self.expires_at <= now
    }

    /// Key rendered for logs and error messages.
    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}
