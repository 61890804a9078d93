use std::time::Duration;

use serde::{Deserialize, Serialize};

/// `[chain]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of the node that signs for the operator account
    pub rpc_endpoint: String,

    /// 0x-prefixed address transactions are sent from. Required unless the
    /// server runs in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_account: Option<String>,

    /// Wait between two ticks of an operator (default: 1000ms)
    pub tick_interval_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "http://127.0.0.1:8545".to_string(),
            operator_account: None,
            tick_interval_ms: 1000,
        }
    }
}

impl ChainConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
