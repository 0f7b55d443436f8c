//! Payload types carried by `RadioEvent` variants

use serde::{Deserialize, Serialize};

/// End of a track or stream, as reported by the decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EofInfo {
    /// Track identifier: stream URL or file name (without directory)
    pub name: Option<String>,
    /// Whether the finished track was the last one of a sequence
    pub last: bool,
}

/// Information about a local file about to be played
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name without directory
    pub name: String,
    /// Total duration in seconds
    pub total: u64,
    /// Total duration formatted as `mm:ss` or `hh:mm:ss`
    pub total_pretty: String,
    /// Whether this is the last file of a sequence
    pub last: bool,
}

/// A single ID3v2 tag reported by the decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Id3Tag {
    pub tag: String,
    pub value: String,
}

/// Playback position sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    /// Elapsed fraction of the track (0.0 - 1.0)
    pub elapsed: f64,
    /// Whether playback is paused
    pub pause: bool,
}
