//! In-memory stand-in for a chain node.
//!
//! Used when the registry runs in debug mode and throughout the tests. Every
//! bound resource gets a game that starts in the commit phase and advances
//! only when the matching forcing transaction is submitted, like the real
//! contract would. Nothing leaves the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::AuthContext;
use crate::client::{ChainClient, ChainConnection, GameContract};
use crate::error::TickError;
use crate::state::{GAME_COMMIT_STATE, GameState, Transition, TxReceipt};
use crate::types::ResourceId;

#[derive(Debug, Default)]
struct SimulatedGame {
    state: u64,
    history: Vec<Transition>,
}

#[derive(Debug, Default)]
struct ChainInner {
    games: HashMap<ResourceId, SimulatedGame>,
    offline: bool,
    latency: Duration,
    tx_count: u64,
}

/// Shared handle to a simulated chain. Clones see the same games.
#[derive(Debug, Clone, Default)]
pub struct SimulatedChain {
    inner: Arc<Mutex<ChainInner>>,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ChainInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `connect` fail until turned back on
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delay applied to every state read
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Overwrite the raw state of a game, deploying it if needed
    pub fn set_state(&self, resource: &ResourceId, raw: u64) {
        self.lock().games.entry(resource.clone()).or_default().state = raw;
    }

    /// Current state of a game, if it was ever bound
    pub fn state_of(&self, resource: &ResourceId) -> Option<GameState> {
        self.lock()
            .games
            .get(resource)
            .map(|game| GameState::from_raw(game.state))
    }

    /// Every transition that landed on a game, oldest first
    pub fn history(&self, resource: &ResourceId) -> Vec<Transition> {
        self.lock()
            .games
            .get(resource)
            .map(|game| game.history.clone())
            .unwrap_or_default()
    }

    /// Number of transactions accepted across all games
    pub fn tx_count(&self) -> u64 {
        self.lock().tx_count
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    fn describe(&self) -> String {
        "simulated chain".to_string()
    }

    async fn connect(&self) -> Result<Box<dyn ChainConnection>, TickError> {
        if self.lock().offline {
            return Err(TickError::Connection("simulated chain is offline".to_string()));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ChainConnection for SimulatedChain {
    async fn bind(&self, resource: &ResourceId) -> Result<Box<dyn GameContract>, TickError> {
        if resource.as_str().is_empty() {
            return Err(TickError::Bind {
                resource: resource.clone(),
                reason: "empty contract address".to_string(),
            });
        }
        self.lock()
            .games
            .entry(resource.clone())
            .or_insert_with(|| SimulatedGame {
                state: GAME_COMMIT_STATE,
                history: Vec::new(),
            });

        Ok(Box::new(SimulatedContract {
            chain: self.clone(),
            resource: resource.clone(),
        }))
    }
}

struct SimulatedContract {
    chain: SimulatedChain,
    resource: ResourceId,
}

#[async_trait]
impl GameContract for SimulatedContract {
    async fn game_state(&self) -> Result<GameState, TickError> {
        let latency = self.chain.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.chain
            .state_of(&self.resource)
            .ok_or_else(|| TickError::StateRead(format!("no game deployed at {}", self.resource)))
    }

    async fn force(
        &self,
        _auth: Option<&AuthContext>,
        transition: Transition,
    ) -> Result<TxReceipt, TickError> {
        let mut inner = self.chain.lock();
        let game = inner
            .games
            .get_mut(&self.resource)
            .ok_or_else(|| TickError::Submission {
                transition,
                reason: format!("no game deployed at {}", self.resource),
            })?;

        // The contract reverts transitions that do not match its phase
        if GameState::from_raw(game.state).next_transition() != Some(transition) {
            return Err(TickError::Submission {
                transition,
                reason: format!(
                    "transaction reverted in state {}",
                    GameState::from_raw(game.state)
                ),
            });
        }

        game.state = transition.target().raw();
        game.history.push(transition);
        inner.tx_count += 1;

        Ok(TxReceipt {
            hash: format!("0x{:064x}", inner.tx_count),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn bind(chain: &SimulatedChain, id: &str) -> Box<dyn GameContract> {
        let conn = chain.connect().await.unwrap();
        conn.bind(&ResourceId::from(id)).await.unwrap()
    }

    #[tokio::test]
    async fn test_bind_deploys_in_commit_state() {
        let chain = SimulatedChain::new();
        let game = bind(&chain, "0x1").await;
        assert_eq!(game.game_state().await.unwrap(), GameState::Commit);
    }

    #[tokio::test]
    async fn test_forcing_walks_the_cycle() {
        let chain = SimulatedChain::new();
        let game = bind(&chain, "0x1").await;

        for transition in [Transition::ForceReveal, Transition::ForcePayout, Transition::Reset] {
            let receipt = game.force(None, transition).await.unwrap();
            assert!(receipt.hash.starts_with("0x"));
        }

        assert_eq!(game.game_state().await.unwrap(), GameState::Commit);
        assert_eq!(chain.tx_count(), 3);
        assert_eq!(
            chain.history(&ResourceId::from("0x1")),
            vec![Transition::ForceReveal, Transition::ForcePayout, Transition::Reset]
        );
    }

    #[tokio::test]
    async fn test_out_of_phase_transition_reverts() {
        let chain = SimulatedChain::new();
        let game = bind(&chain, "0x1").await;

        let err = game.force(None, Transition::Reset).await.unwrap_err();
        assert!(matches!(err, TickError::Submission { .. }));
        assert_eq!(chain.tx_count(), 0);
    }

    #[tokio::test]
    async fn test_offline_connect_fails() {
        let chain = SimulatedChain::new();
        chain.set_offline(true);
        assert!(matches!(
            chain.connect().await.err().unwrap(),
            TickError::Connection(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_resource_fails_to_bind() {
        let chain = SimulatedChain::new();
        let conn = chain.connect().await.unwrap();
        assert!(matches!(
            conn.bind(&ResourceId::from("")).await.err().unwrap(),
            TickError::Bind { .. }
        ));
    }
}
