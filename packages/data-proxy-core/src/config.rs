//! Proxy configuration.

use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

/// Proxy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Rows per page (0 = unpaginated)
    pub sample_size: usize,
    /// First base row of the initial page
    pub sample_start: usize,
    /// Leave resyncs pending for an external scheduler
    pub defer_sync: bool,
    /// Resync items processed per scheduler tick
    pub resync_step: usize,
    /// Show a synthetic blank row before all others
    pub add_null_entry: bool,
    /// Keep pending changes across base table resets
    pub cache_changes: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            sample_size: 300,
            sample_start: 0,
            defer_sync: false,
            resync_step: 50,
            add_null_entry: false,
            cache_changes: false,
        }
    }
}

impl ProxyConfig {
    /// Parses a (possibly partial) JSON configuration document.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, ProxyError> {
        let config: ProxyConfig = serde_json::from_str(json)
            .map_err(|e| ProxyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.resync_step == 0 {
            return Err(ProxyError::InvalidConfig(
                "resync_step must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
