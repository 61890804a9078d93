pub mod address;
pub mod auth;
pub mod client;
pub mod error;
pub mod rpc;
pub mod simulated;
pub mod state;
pub mod types;

// Re-export main types
pub use self::address::{Address, AddressParseError};
pub use self::auth::{AuthContext, CredentialError};
pub use self::client::{ChainClient, ChainConnection, GameContract};
pub use self::error::TickError;
pub use self::rpc::JsonRpcClient;
pub use self::simulated::SimulatedChain;
pub use self::state::{GameState, Transition, TxReceipt};
pub use self::types::ResourceId;
