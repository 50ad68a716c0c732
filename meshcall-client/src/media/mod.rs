mod local_tracks;
mod media_source;

pub use local_tracks::*;
pub use media_source::*;
