#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use gamemaster_chain::SimulatedChain;
use gamemaster_runner::config::GamemasterConfig;
use gamemaster_runner::{Clerk, Server};

/// Debug-mode config on a free port with a fast tick
pub fn test_config() -> GamemasterConfig {
    let mut config = GamemasterConfig::debug(0);
    config.chain.tick_interval_ms = 10;
    config
}

pub async fn start_server() -> Server {
    Server::start(&test_config()).await.expect("server starts")
}

/// Server whose games live on `chain`, so tests can inspect them
pub async fn start_server_on(chain: &SimulatedChain, cancel_timeout_ms: Option<u64>) -> Server {
    let mut config = test_config();
    config.server.cancel_timeout_ms = cancel_timeout_ms;
    Server::start_with_client(&config, Arc::new(chain.clone()), None)
        .await
        .expect("server starts")
}

pub async fn connect(server: &Server) -> Clerk {
    Clerk::connect(server.local_addr().to_string())
        .await
        .expect("clerk connects")
}

pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
