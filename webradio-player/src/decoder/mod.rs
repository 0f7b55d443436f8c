//! External decoder control

pub mod protocol;
mod supervisor;

pub use supervisor::{DecoderSupervisor, PlaybackState};
