pub use meshcall_core::{ParticipantId, RoomId};

pub mod model {
    pub use meshcall_core::model::*;
}

pub mod codec {
    pub use meshcall_core::codec::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use meshcall_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshcall_client::*;
}
