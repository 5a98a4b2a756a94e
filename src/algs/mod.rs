//! Communication algorithms and wire formats.

pub mod communicator;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, Wait, wait_all};
