//! Identity and secret primitives shared by every gate.

pub mod id;
pub mod secret;

pub use id::*;
pub use secret::*;
