//! Session tuning knobs.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Room session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Characters of the reply target shown in a reply preview. Default: 80.
    pub preview_chars: usize,
    /// Optimistic sends allowed to await confirmation at once. Default: 64.
    pub max_pending_sends: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            preview_chars: 80,
            max_pending_sends: 64,
        }
    }
}

impl SessionConfig {
    /// Config for testing (short previews, small pending window).
    pub fn for_testing() -> Self {
        Self {
            preview_chars: 16,
            max_pending_sends: 4,
        }
    }

    /// Read a JSON config file; missing or unreadable files fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<SessionConfig>(&content) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("Failed to parse session config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) => {
                log::info!("Session config {} not found ({err}); using defaults", path.display());
                Self::default()
            }
        }
    }
}
