use gamemaster_chain::{CredentialError, ResourceId};
use gamemaster_protocol::{Fault, FaultKind};
use thiserror::Error;

/// Recoverable failures of registry operations, returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("game at {0} already operated")]
    AlreadyOperated(ResourceId),

    #[error("game at {0} not operated")]
    NotOperated(ResourceId),

    #[error("you must give me a message")]
    EmptyMessage,

    #[error("registry is shutting down")]
    ShuttingDown,

    #[error("operator for {0} did not acknowledge cancellation in time")]
    CancelTimedOut(ResourceId),
}

impl RegistryError {
    pub fn kind(&self) -> FaultKind {
        match self {
            RegistryError::AlreadyOperated(_) => FaultKind::AlreadyOperated,
            RegistryError::NotOperated(_) => FaultKind::NotOperated,
            RegistryError::EmptyMessage => FaultKind::EmptyMessage,
            RegistryError::ShuttingDown => FaultKind::ShuttingDown,
            RegistryError::CancelTimedOut(_) => FaultKind::CancelTimedOut,
        }
    }

    fn resource(&self) -> Option<&ResourceId> {
        match self {
            RegistryError::AlreadyOperated(id)
            | RegistryError::NotOperated(id)
            | RegistryError::CancelTimedOut(id) => Some(id),
            RegistryError::EmptyMessage | RegistryError::ShuttingDown => None,
        }
    }

    /// Wire form of this error
    pub fn to_fault(&self) -> Fault {
        let fault = Fault::new(self.kind(), self.to_string());
        match self.resource() {
            Some(id) => fault.with_resource(id.as_str()),
            None => fault,
        }
    }

    /// Rebuild the typed error from a fault. Returns `None` for faults that
    /// have no registry counterpart or are missing their resource id.
    pub fn from_fault(fault: &Fault) -> Option<Self> {
        let resource = || fault.resource_id.clone().map(ResourceId::from);
        match fault.kind {
            FaultKind::AlreadyOperated => resource().map(RegistryError::AlreadyOperated),
            FaultKind::NotOperated => resource().map(RegistryError::NotOperated),
            FaultKind::CancelTimedOut => resource().map(RegistryError::CancelTimedOut),
            FaultKind::EmptyMessage => Some(RegistryError::EmptyMessage),
            FaultKind::ShuttingDown => Some(RegistryError::ShuttingDown),
            FaultKind::BadRequest | FaultKind::ReplyTooLarge => None,
        }
    }
}

/// Unrecoverable configuration problems found while starting a server
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("bad operator account: {0}")]
    BadCredential(#[from] CredentialError),

    #[error("failed to create chain client for {endpoint}: {reason}")]
    ChainClient { endpoint: String, reason: String },

    #[error("listen error on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
