//! mpg123 remote-control protocol
//!
//! Outbound commands are single newline-terminated lines. Inbound lines are
//! classified by prefix; anything unrecognized is [`DecoderLine::Other`] and
//! gets ignored by the reader.

use std::fmt;

/// Commands understood by the decoder in `-R` mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Load and start a single track or stream
    Load(&'a str),
    /// Load a playlist, starting with its first entry
    LoadList(&'a str),
    Stop,
    /// Toggle pause (also used for resume)
    Pause,
    Volume(u8),
    /// Request a position sample
    Sample,
    Quit,
}

impl Command<'_> {
    /// Whether the decoder answers this command with an acknowledgement line
    /// the caller has to wait for
    pub fn expects_ack(&self) -> bool {
        !matches!(self, Command::Volume(_) | Command::Quit)
    }

    /// Wire form including the trailing newline
    pub fn encode(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Load(target) => write!(f, "LOAD {}", target),
            Command::LoadList(target) => write!(f, "LOADLIST 0 {}", target),
            Command::Stop => write!(f, "STOP"),
            Command::Pause => write!(f, "PAUSE"),
            Command::Volume(volume) => write!(f, "VOLUME {}", volume),
            Command::Sample => write!(f, "SAMPLE"),
            Command::Quit => write!(f, "QUIT"),
        }
    }
}

/// Classified decoder output line
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderLine {
    /// `@I ICY-META: StreamTitle='text';`
    IcyMeta(String),
    /// `@I ICY-NAME: name`
    IcyName(String),
    /// `@I ID3v2.tag:value`
    Id3 { tag: String, value: String },
    /// `@P 0`
    Stopped,
    /// `@P 1`
    Paused,
    /// `@P 2`
    Playing,
    /// `@SAMPLE elapsed total`; `None` if the numbers are unusable
    Sample(Option<f64>),
    /// `@F` frame progress
    Frame,
    Other,
}

impl DecoderLine {
    /// Classify one line of decoder output (trailing newline optional)
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.starts_with("@F") {
            DecoderLine::Frame
        } else if let Some(rest) = line.strip_prefix("@I ICY-META") {
            DecoderLine::IcyMeta(parse_icy_meta(rest))
        } else if let Some(rest) = line.strip_prefix("@I ICY-NAME") {
            let name = rest.strip_prefix(':').unwrap_or(rest);
            DecoderLine::IcyName(name.trim().to_string())
        } else if let Some(rest) = line.strip_prefix("@I ID3v2") {
            let rest = rest.strip_prefix('.').unwrap_or(rest);
            match rest.split_once(':') {
                Some((tag, value)) => DecoderLine::Id3 {
                    tag: tag.trim().to_string(),
                    value: value.trim().to_string(),
                },
                None => DecoderLine::Other,
            }
        } else if line.starts_with("@P 0") {
            DecoderLine::Stopped
        } else if line.starts_with("@P 1") {
            DecoderLine::Paused
        } else if line.starts_with("@P 2") {
            DecoderLine::Playing
        } else if let Some(rest) = line.strip_prefix("@SAMPLE") {
            DecoderLine::Sample(parse_sample(rest))
        } else {
            DecoderLine::Other
        }
    }
}

/// Text between the first pair of single quotes, or the whole remainder
fn parse_icy_meta(rest: &str) -> String {
    let quoted = rest
        .split_once('\'')
        .and_then(|(_, tail)| tail.split_once('\''))
        .map(|(text, _)| text);

    match quoted {
        Some(text) => text.to_string(),
        None => rest.strip_prefix(':').unwrap_or(rest).trim().to_string(),
    }
}

fn parse_sample(rest: &str) -> Option<f64> {
    let mut fields = rest.split_whitespace();
    let elapsed: f64 = fields.next()?.parse().ok()?;
    let total: f64 = fields.next()?.parse().ok()?;
    if total <= 0.0 {
        return None;
    }
    Some(elapsed / total)
}
