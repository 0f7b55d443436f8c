//! Test helper modules for webradio integration tests
//!
//! - FakeDecoder: in-memory stand-in for the decoder process
//! - TestRadio: fully wired application over a temporary music tree

#![allow(dead_code)]

pub mod fake_decoder;
pub mod test_radio;

pub use fake_decoder::FakeDecoder;
pub use test_radio::{eventually, next_event, FixedProbe, TestRadio};
