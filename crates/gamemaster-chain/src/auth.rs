use thiserror::Error;

use crate::address::{Address, AddressParseError};

/// Authorization used when submitting forcing transactions.
///
/// Transactions are sent from the operator account and signed by the node
/// the client is connected to; no key material is held in-process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    operator: Address,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no operator account configured")]
    Missing,
    #[error("bad operator account: {0}")]
    Malformed(#[from] AddressParseError),
}

impl AuthContext {
    pub fn new(operator: Address) -> Self {
        Self { operator }
    }

    /// Derive the context from the configured credential string
    pub fn from_credential(credential: &str) -> Result<Self, CredentialError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(CredentialError::Missing);
        }
        Ok(Self::new(credential.parse()?))
    }

    pub fn operator(&self) -> Address {
        self.operator
    }
}
