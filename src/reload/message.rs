//! Live reload message protocol.
//!
//! JSON messages pushed from the preview server to browser tabs:
//!
//! - `connected`: sent once after the handshake
//! - `reload`: a render pass finished, reload the page

use serde::{Deserialize, Serialize};

/// Message sent over the live reload WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HotReloadMessage {
    Reload {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    Connected {
        /// Server version for compatibility check
        version: String,
    },
}

impl HotReloadMessage {
    #[cfg(test)]
    pub fn reload() -> Self {
        Self::Reload { reason: None }
    }

    pub fn reload_with_reason(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}
