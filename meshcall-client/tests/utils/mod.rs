pub mod mock_connection;

pub use event_helpers::*;
pub use mock_connection::*;
pub use mock_media::*;
pub use relay_connector::*;
pub use scripted_connector::*;
