use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Well-known control-plane port
pub const DEFAULT_PORT: u16 = 11112;

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on; empty means all interfaces
    pub bind_address: String,

    pub port: u16,

    /// Operate games against the in-memory chain; no operator account needed
    pub debug: bool,

    /// How long detach and teardown wait for an operator to acknowledge a
    /// stop before aborting it. Unset means wait forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            debug: false,
            cancel_timeout_ms: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` string handed to the listener
    pub fn listen_address(&self) -> String {
        let host = if self.bind_address.is_empty() {
            "0.0.0.0"
        } else {
            self.bind_address.as_str()
        };
        format!("{}:{}", host, self.port)
    }

    pub fn cancel_timeout(&self) -> Option<Duration> {
        self.cancel_timeout_ms.map(Duration::from_millis)
    }
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.listen_address())?;
        if self.debug {
            write!(f, " (debug)")?;
        }
        Ok(())
    }
}
