mod config;
mod error;
mod handle;
mod reply;
mod runtime;

pub use config::{ClientConfig, directed_broadcast};
pub use error::ClientError;
pub use handle::DeviceHandle;
pub use reply::{Fetched, Freshness, Reply};
pub use runtime::{Client, ClientState, GroupResult};
