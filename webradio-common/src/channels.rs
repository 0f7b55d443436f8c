//! Radio channel list
//!
//! The channel file is a JSON array of `{name, url, logo}` objects. Channels
//! are numbered 1..N in file order; that number is the only identity a
//! channel has.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// A radio channel as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// 1-based position in the channel file
    pub nr: usize,
    /// Display name
    pub name: String,
    /// Stream URL handed to the decoder
    pub url: String,
    /// Logo path relative to the web root (`images/<file>`), if the image exists
    pub logo: Option<String>,
}

/// Channel entry as written in the channel file
#[derive(Debug, Deserialize)]
struct ChannelEntry {
    name: String,
    url: String,
    #[serde(default)]
    logo: Option<String>,
}

/// Load and number the channels from `path`.
///
/// Logos are resolved against `<web_root>/images`; a logo whose image file
/// does not exist is dropped.
pub fn load_channels(path: &Path, web_root: &Path) -> Result<Vec<Channel>> {
    info!("Loading channels from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_channels(&content, web_root)
}

/// Parse a channel file's content (see [`load_channels`]).
pub fn parse_channels(content: &str, web_root: &Path) -> Result<Vec<Channel>> {
    let entries: Vec<ChannelEntry> = serde_json::from_str(content)?;

    let channels = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let logo = entry.logo.and_then(|logo| {
                if web_root.join("images").join(&logo).exists() {
                    Some(format!("images/{}", logo))
                } else {
                    debug!("Logo {} for channel {} not found", logo, entry.name);
                    None
                }
            });
            Channel {
                nr: index + 1,
                name: entry.name,
                url: entry.url,
                logo,
            }
        })
        .collect::<Vec<_>>();

    debug!("Loaded {} channels", channels.len());
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CHANNELS: &str = r#"[
        {"name": "Jazz FM", "url": "http://jazz.example/stream", "logo": "jazz.png"},
        {"name": "News", "url": "http://news.example/live.m3u", "logo": "missing.png"},
        {"name": "Plain", "url": "http://plain.example/"}
    ]"#;

    #[test]
    fn test_channels_numbered_in_file_order() {
        let web_root = TempDir::new().unwrap();
        let channels = parse_channels(CHANNELS, web_root.path()).unwrap();

        let numbers: Vec<usize> = channels.iter().map(|c| c.nr).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(channels[1].name, "News");
        assert_eq!(channels[1].url, "http://news.example/live.m3u");
    }

    #[test]
    fn test_logo_kept_only_if_image_exists() {
        let web_root = TempDir::new().unwrap();
        std::fs::create_dir(web_root.path().join("images")).unwrap();
        std::fs::write(web_root.path().join("images/jazz.png"), b"png").unwrap();

        let channels = parse_channels(CHANNELS, web_root.path()).unwrap();
        assert_eq!(channels[0].logo.as_deref(), Some("images/jazz.png"));
        assert_eq!(channels[1].logo, None);
        assert_eq!(channels[2].logo, None);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let web_root = TempDir::new().unwrap();
        assert!(parse_channels("{not json", web_root.path()).is_err());
    }

    #[test]
    fn test_channel_wire_shape() {
        let channel = Channel {
            nr: 4,
            name: "X".to_string(),
            url: "http://x".to_string(),
            logo: None,
        };
        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"nr": 4, "name": "X", "url": "http://x", "logo": null})
        );
    }
}
