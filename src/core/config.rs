use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8765";

/// Connection settings for the AnkiConnect client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: String,
    /// Timeout applied to every call that does not ask for its own.
    pub request_timeout_secs: u64,
    /// Timeout for media uploads, unless the asset overrides it.
    pub media_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 30,
            media_timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Self::default() }
    }

    /// Settings from a manifest, with a command-line endpoint taking precedence.
    pub fn resolve(from_manifest: Option<&ClientConfig>, endpoint: Option<String>) -> Self {
        let mut config = from_manifest.cloned().unwrap_or_default();
        if let Some(endpoint) = endpoint {
            config.endpoint = endpoint;
        }
        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs)
    }
}

/// Switches controlling a single reconciliation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOptions {
    /// Upload every media asset even when Anki already has a file of that name.
    pub force_media: bool,
    /// Treat field-list drift on existing note types as a fatal error.
    pub strict_fields: bool,
    pub skip_media: bool,
    pub skip_schema: bool,
    pub skip_examples: bool,
}
