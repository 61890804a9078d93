pub mod chain_config;
pub mod gamemaster_config;
pub mod paths;
pub mod server_config;

pub use chain_config::ChainConfig;
pub use gamemaster_config::{ConfigLoadError, GamemasterConfig};
pub use paths::ProjectPaths;
pub use server_config::{DEFAULT_PORT, ServerConfig};
