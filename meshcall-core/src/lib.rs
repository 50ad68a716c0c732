pub mod codec;
pub mod model;
pub mod utils;

pub use codec::{DecodeError, decode, decode_frame, encode, encode_frame};
pub use model::*;
