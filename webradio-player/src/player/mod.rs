//! Local file playback

mod coordinator;
pub mod listing;
mod probe;

pub use coordinator::{PlaybackCoordinator, SEQUENCER_ID};
pub use listing::DirectoryListing;
pub use probe::{DurationProbe, Mp3InfoProbe};
