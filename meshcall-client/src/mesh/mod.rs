mod mesh_command;
mod mesh_coordinator;
mod mesh_event;
mod mesh_handle;

pub(crate) use mesh_command::MeshCommand;
pub use mesh_coordinator::*;
pub use mesh_event::*;
pub use mesh_handle::*;
