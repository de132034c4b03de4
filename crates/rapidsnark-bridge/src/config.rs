//! Bridge configuration

use serde::{Deserialize, Serialize};

use crate::buffer::DEFAULT_ERROR_BUFFER_CAPACITY;
use crate::error::AttachError;
use crate::executor::WorkerPolicy;
use crate::marshal::MAX_BUFFER_CAPACITY;

/// Channel name used when the host does not register a custom one
pub const DEFAULT_CHANNEL_NAME: &str = "com.rapidsnark.bridge";

/// Settings fixed at attach time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Method channel the bridge is registered under
    pub channel_name: String,
    /// Worker pool sizing
    pub workers: WorkerPolicy,
    /// Error buffer capacity for calls that may omit one
    pub default_error_buffer_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            workers: WorkerPolicy::default(),
            default_error_buffer_capacity: DEFAULT_ERROR_BUFFER_CAPACITY,
        }
    }
}

impl BridgeConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, AttachError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against the range the native engine accepts
    pub fn validate(&self) -> Result<(), AttachError> {
        let capacity = self.default_error_buffer_capacity;
        if !(1..=MAX_BUFFER_CAPACITY).contains(&capacity) {
            return Err(AttachError::OutOfRange {
                reason: format!(
                    "defaultErrorBufferCapacity {capacity} is outside 1..={MAX_BUFFER_CAPACITY}"
                ),
            });
        }
        Ok(())
    }

    /// Use `policy` for the worker pool
    #[must_use]
    pub fn with_workers(mut self, policy: WorkerPolicy) -> Self {
        self.workers = policy;
        self
    }
}
