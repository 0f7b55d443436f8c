//! Event types for the webradio event system
//!
//! Every state change is published as a [`RadioEvent`]. The event bus renders
//! each event once into a [`BusEvent`] (event + display text) before handing
//! it to subscribers. On the wire a `BusEvent` is one JSON object:
//! `{"type": <kind>, "value": <payload>, "text": <rendered string>}`.

mod payload_types;

pub use payload_types::{EofInfo, FileInfo, Id3Tag, SampleInfo};

use crate::channels::Channel;
use serde::{Deserialize, Serialize};

/// Webradio event types
///
/// The set of kinds is closed; each variant carries a typed payload that is
/// serialized under `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RadioEvent {
    /// Program version, sent to every new subscriber
    Version(String),

    /// Snapshot of the shared state document
    State(serde_json::Value),

    /// Decoder started (or resumed) playing the given track
    Play(Option<String>),

    /// Decoder paused the given track
    Pause(Option<String>),

    /// Track or stream ended
    Eof(EofInfo),

    /// Volume changed (0-100)
    VolSet(u8),

    /// Local file about to be played
    FileInfo(FileInfo),

    /// ID3v2 tag of the current file
    Id3(Id3Tag),

    /// ICY stream metadata (usually the current title)
    IcyMeta(String),

    /// ICY stream name
    IcyName(String),

    /// Current player directory changed (root-relative, `/`-terminated)
    DirSelect(String),

    /// Radio switched to a channel
    RadioPlayChannel(Channel),

    /// Playback position sample
    Sample(SampleInfo),

    /// Liveness signal, carries the local time
    KeepAlive(String),

    /// System command issued (restart, stop, reboot, halt)
    Sys(String),
}

impl RadioEvent {
    /// Wire name of this event's kind
    pub fn kind(&self) -> &'static str {
        match self {
            RadioEvent::Version(_) => "version",
            RadioEvent::State(_) => "state",
            RadioEvent::Play(_) => "play",
            RadioEvent::Pause(_) => "pause",
            RadioEvent::Eof(_) => "eof",
            RadioEvent::VolSet(_) => "vol_set",
            RadioEvent::FileInfo(_) => "file_info",
            RadioEvent::Id3(_) => "id3",
            RadioEvent::IcyMeta(_) => "icy_meta",
            RadioEvent::IcyName(_) => "icy_name",
            RadioEvent::DirSelect(_) => "dir_select",
            RadioEvent::RadioPlayChannel(_) => "radio_play_channel",
            RadioEvent::Sample(_) => "sample",
            RadioEvent::KeepAlive(_) => "keep_alive",
            RadioEvent::Sys(_) => "sys",
        }
    }

    /// Render the human-readable display text of this event.
    ///
    /// Kinds without a display template fall back to the compact JSON form
    /// of the event.
    pub fn render(&self) -> String {
        match self {
            RadioEvent::Version(version) => format!("webradio version {}", version),
            RadioEvent::Play(track) => format!("playing {}", track_name(track)),
            RadioEvent::Pause(track) => format!("pausing {}", track_name(track)),
            RadioEvent::Eof(info) => format!("{} finished", track_name(&info.name)),
            RadioEvent::VolSet(volume) => format!("setting current volume to {}", volume),
            RadioEvent::FileInfo(info) => format!("{}: {}", info.name, info.total_pretty),
            RadioEvent::Id3(tag) => format!("{}: {}", tag.tag, tag.value),
            RadioEvent::IcyMeta(text) | RadioEvent::IcyName(text) => text.clone(),
            RadioEvent::DirSelect(dir) => format!("current directory: {}", dir),
            RadioEvent::RadioPlayChannel(channel) => {
                format!("start playing channel {} ({})", channel.nr, channel.name)
            }
            RadioEvent::KeepAlive(time) => format!("current time: {}", time),
            RadioEvent::State(_) | RadioEvent::Sample(_) | RadioEvent::Sys(_) => {
                self.render_generic()
            }
        }
    }

    fn render_generic(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

fn track_name(track: &Option<String>) -> &str {
    track.as_deref().unwrap_or("-")
}

/// A rendered event as delivered to subscribers
///
/// Immutable once created; subscribers share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusEvent {
    #[serde(flatten)]
    pub event: RadioEvent,
    pub text: String,
}

impl BusEvent {
    /// Render `event` and wrap it for delivery
    pub fn new(event: RadioEvent) -> Self {
        let text = event.render();
        Self { event, text }
    }

    /// Wire name of the wrapped event's kind
    pub fn kind(&self) -> &'static str {
        self.event.kind()
    }
}

impl From<RadioEvent> for BusEvent {
    fn from(event: RadioEvent) -> Self {
        BusEvent::new(event)
    }
}
