//! Boundary between operators and the chain.
//!
//! An operator tick walks the three levels in order: connect, bind the game
//! contract, then read its state and possibly force a transition. Each level
//! reports its own `TickError` variant so the operator can log where a tick
//! was abandoned.

use async_trait::async_trait;

use crate::auth::AuthContext;
use crate::error::TickError;
use crate::state::{GameState, Transition, TxReceipt};
use crate::types::ResourceId;

/// Opens connections to a chain node
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Short description for logs (endpoint, "simulated", ...)
    fn describe(&self) -> String;

    async fn connect(&self) -> Result<Box<dyn ChainConnection>, TickError>;
}

/// A live connection able to bind game contracts
#[async_trait]
pub trait ChainConnection: Send + Sync {
    async fn bind(&self, resource: &ResourceId) -> Result<Box<dyn GameContract>, TickError>;
}

/// A bound game contract
#[async_trait]
pub trait GameContract: Send + Sync {
    async fn game_state(&self) -> Result<GameState, TickError>;

    /// Submit `transition`. `auth` is `None` when the registry runs without
    /// an operator account; implementations that need one must fail with
    /// `TickError::Submission`.
    async fn force(
        &self,
        auth: Option<&AuthContext>,
        transition: Transition,
    ) -> Result<TxReceipt, TickError>;
}
