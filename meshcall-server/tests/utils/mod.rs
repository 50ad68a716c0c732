
pub use frame_helpers::*;
pub use test_member::*;
