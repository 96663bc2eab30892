//! Test doubles for the environment traits
//!
//! Enabled with the `test-utils` feature (on by default).

mod transport;

pub use transport::{HeldResponse, MockTransport};
