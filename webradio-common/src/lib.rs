//! # Webradio Common Library
//!
//! Shared code for the webradio player and its command-line client:
//! - Event types (`RadioEvent` enum) and their display rendering
//! - Channel list records and loading
//! - Configuration loading
//! - Persisted state document
//! - Duration formatting

pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod persist;

pub use channels::Channel;
pub use error::{Error, Result};
pub use events::{BusEvent, RadioEvent};
