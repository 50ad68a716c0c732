pub mod connection;
pub mod media;
pub mod mesh;
pub mod session;
pub mod signaling;

mod config;
mod error;

pub use config::MeshConfig;
pub use error::{AcquisitionError, MeshError};
pub use mesh::{JoinedMesh, MeshCoordinator, MeshEvent, MeshHandle, PeerSnapshot};
