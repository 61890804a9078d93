mod clerk;
pub mod config;
mod error;
pub mod logging;
mod registry;
mod server;
mod worker;

pub use clerk::{Clerk, ClerkError};
pub use error::{RegistryError, StartupError};
pub use registry::{OperatorContext, Registry};
pub use server::Server;
pub use worker::{Worker, WorkerError, WorkerStats};

pub use gamemaster_chain::ResourceId;
pub use gamemaster_protocol::ResourceStatus;
