//! Configuration loading
//!
//! The configuration file is TOML with one table per component. Every key
//! has a compiled default, so a missing file (or a missing key) is never
//! fatal. A file that exists but cannot be parsed is an error.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `WEBRADIO_CONFIG` environment variable
//! 3. `~/.config/webradio/webradio.toml`
//! 4. `/etc/webradio/webradio.toml`
//! 5. Compiled defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "WEBRADIO_CONFIG";

/// System-wide configuration file
const SYSTEM_CONFIG: &str = "/etc/webradio/webradio.toml";

/// Complete configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub global: GlobalConfig,
    pub web: WebConfig,
    pub decoder: DecoderConfig,
    pub player: PlayerConfig,
    pub events: EventsConfig,
}

/// `[global]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Debug mode: verbose logging, system commands are not executed
    pub debug: bool,
    /// JSON channel list
    pub channel_file: PathBuf,
    /// Persisted state document
    pub state_file: PathBuf,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug: false,
            channel_file: PathBuf::from("/etc/webradio/channels.json"),
            state_file: home_dir().join(".pi-webradio.json"),
        }
    }
}

/// `[web]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `index.html`, scripts, styles and channel logos
    pub web_root: PathBuf,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9026,
            web_root: PathBuf::from("/usr/local/lib/webradio/web"),
        }
    }
}

/// `[decoder]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Decoder executable, started in remote-control mode (`-R`)
    pub program: String,
    /// Extra arguments appended after `-R`
    pub options: Vec<String>,
    /// Volume used when no persisted volume exists
    pub vol_default: u8,
    /// Step for volume up/down without explicit amount
    pub vol_delta: u8,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: "mpg123".to_string(),
            options: Vec::new(),
            vol_default: 30,
            vol_delta: 5,
        }
    }
}

/// `[player]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Directory tree the player may browse; nothing outside is reachable
    pub root_dir: PathBuf,
    /// Directory used when the persisted one is invalid (defaults to `root_dir`)
    pub def_dir: Option<PathBuf>,
    /// Seconds to wait at startup for the current directory to appear
    pub wait_dir: u64,
    /// File extensions listed as playable (without dot, case-insensitive)
    pub extensions: Vec<String>,
    /// Duration probe executable (`<probe> -p %S <file>` prints seconds)
    pub probe_program: String,
    /// Polling slice of the directory sequencer in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            root_dir: home_dir(),
            def_dir: None,
            wait_dir: 10,
            extensions: vec!["mp3".to_string()],
            probe_program: "mp3info".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

impl PlayerConfig {
    /// Default directory, falling back to the root directory
    pub fn default_dir(&self) -> PathBuf {
        self.def_dir.clone().unwrap_or_else(|| self.root_dir.clone())
    }
}

/// `[events]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Capacity of each subscriber queue
    pub queue_size: usize,
    /// Seconds without events before a keep-alive is sent
    pub keep_alive_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            queue_size: 20,
            keep_alive_secs: 15,
        }
    }
}

impl TomlConfig {
    /// Parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve and load the configuration, falling back to compiled defaults.
    ///
    /// Returns the configuration and the file it was read from, if any.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match resolve_config_path(cli_arg) {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                let config = Self::load(&path)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                Ok((config, Some(path)))
            }
            Some(path) => {
                warn!(
                    "Configuration file {} not found, using defaults",
                    path.display()
                );
                Ok((Self::default(), None))
            }
            None => {
                info!("No configuration file found, using defaults");
                Ok((Self::default(), None))
            }
        }
    }
}

/// Resolve the configuration file path by priority.
///
/// Explicit choices (command line, environment) are returned even if the file
/// does not exist so the caller can warn about them; the well-known locations
/// are only returned if present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: User configuration
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("webradio").join("webradio.toml")) {
        if user_config.exists() {
            return Some(user_config);
        }
    }

    // Priority 4: System configuration
    let system_config = PathBuf::from(SYSTEM_CONFIG);
    if system_config.exists() {
        return Some(system_config);
    }

    None
}

/// Home directory of the current user (`/` if unknown)
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.web.port, 9026);
        assert_eq!(config.decoder.program, "mpg123");
        assert_eq!(config.decoder.vol_default, 30);
        assert_eq!(config.decoder.vol_delta, 5);
        assert_eq!(config.events.queue_size, 20);
        assert_eq!(config.events.keep_alive_secs, 15);
        assert_eq!(config.player.extensions, vec!["mp3".to_string()]);
        assert_eq!(config.player.default_dir(), config.player.root_dir);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [web]
            port = 8080

            [player]
            root_dir = "/srv/music"
            def_dir = "/srv/music/jazz"
            "#,
        )
        .unwrap();

        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.player.root_dir, PathBuf::from("/srv/music"));
        assert_eq!(config.player.default_dir(), PathBuf::from("/srv/music/jazz"));
        assert_eq!(config.player.wait_dir, 10);
        assert_eq!(config.decoder.vol_delta, 5);
    }

    #[test]
    fn test_decoder_options_list() {
        let config: TomlConfig = toml::from_str(
            r#"
            [decoder]
            options = ["-o", "alsa", "-a", "hw:1"]
            "#,
        )
        .unwrap();
        assert_eq!(config.decoder.options.len(), 4);
        assert_eq!(config.decoder.program, "mpg123");
    }
}
