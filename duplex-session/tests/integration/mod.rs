//! Integration tests for duplex-session.
//!
//! Tests are organized by functionality:
//! - `connection_tests` - role resolution and the offer/answer exchange
//! - `messaging_tests` - data channel messages and history
//! - `recovery_tests` - peer departure, teardown and error reporting

pub mod connection_tests;
pub mod messaging_tests;
pub mod recovery_tests;

use tracing::Level;

use crate::utils::{TestPeer, TestWorld, wait_for_connected};
use duplex_core::PeerProfile;

/// Initialize tracing for tests (call once per test).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Open `first` then `second` against the same world and wait until both
/// are connected.
pub async fn connect_pair(
    world: &TestWorld,
    first: &PeerProfile,
    second: &PeerProfile,
) -> (TestPeer, TestPeer) {
    let a = world.open(first, second);
    let b = world.open(second, first);

    wait_for_connected(&a.session)
        .await
        .expect("First peer did not connect");
    wait_for_connected(&b.session)
        .await
        .expect("Second peer did not connect");

    (a, b)
}
