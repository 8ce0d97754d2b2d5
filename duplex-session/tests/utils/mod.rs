pub mod test_peer;
pub mod wait_helpers;

pub use test_peer::*;
pub use wait_helpers::*;
