mod signaling_link;
mod ws_connector;

pub use signaling_link::*;
pub use ws_connector::*;
