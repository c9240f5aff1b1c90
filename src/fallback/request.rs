//! Generation requests and their cache fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A text-generation request as accepted by `POST /generate` and forwarded
/// to every tier.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Model override. When absent each tier uses its configured model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: None,
            temperature: None,
            model: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Deterministic cache key: hex SHA-256 over the JSON encoding.
    ///
    /// Field order is fixed by the struct, so equal requests always hash
    /// equally, across processes too.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.update(&bytes),
            // Unreachable for this type; hash the prompt alone rather than fail.
            Err(_) => hasher.update(self.prompt.as_bytes()),
        }
        format!("gen:{:x}", hasher.finalize())
    }
}
