use thiserror::Error;

use crate::state::Transition;
use crate::types::ResourceId;

/// Failure inside a single operator tick.
///
/// None of these stop an operator; the tick is abandoned and the next one
/// starts from a fresh state read.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("failed to connect to the chain client: {0}")]
    Connection(String),

    #[error("failed to instantiate game contract {resource}: {reason}")]
    Bind { resource: ResourceId, reason: String },

    #[error("failed to retrieve game state: {0}")]
    StateRead(String),

    #[error("failed to {transition}: {reason}")]
    Submission {
        transition: Transition,
        reason: String,
    },
}
