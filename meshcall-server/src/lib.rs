mod config;
mod room;
mod signaling;

pub use config::RelayConfig;
pub use room::*;
pub use signaling::*;
