//! # Webradio Player Library
//!
//! Plays network radio streams and local audio files through an external
//! decoder and reports every state change to any number of observers.
//!
//! **Components:**
//! - `decoder`: supervisor of the external decoder process
//! - `bus`: event fan-out to bounded per-subscriber queues
//! - `player`: file and directory playback
//! - `radio`: channel selection
//! - `api`: dispatch table, HTTP server and SSE relay

pub mod api;
pub mod app;
pub mod bus;
pub mod client;
pub mod decoder;
pub mod error;
pub mod player;
pub mod radio;
pub mod state;
pub mod system;

pub use app::WebRadio;
pub use bus::{EventBus, Subscription};
pub use decoder::DecoderSupervisor;
pub use error::{Error, Result};
pub use player::PlaybackCoordinator;
pub use radio::ChannelSelector;
pub use state::SharedState;
