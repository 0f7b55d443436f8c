//! Persisted state document
//!
//! A small JSON file remembering what the user last did (mode, channel,
//! directory, file, volume) across restarts. Each component owns one section.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Complete persisted state, one section per component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub webradio: AppSection,
    pub radio: RadioSection,
    pub player: PlayerSection,
    pub decoder: DecoderSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// UI mode (`radio` or `player`), owned by the web UI
    pub mode: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            mode: "radio".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSection {
    /// Last active channel (0 = none)
    pub channel_nr: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSection {
    /// Current directory (absolute)
    pub player_dir: Option<PathBuf>,
    /// Current file (absolute)
    pub player_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSection {
    /// Volume (the pre-mute volume while muted)
    pub volume: Option<u8>,
}

impl PersistedState {
    /// Read the state file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Read the state file, falling back to defaults if it is missing or broken
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("No persisted state at {}", path.display());
            return Self::default();
        }
        info!("Loading settings from {}", path.display());
        match Self::load_from(path) {
            Ok(state) => state,
            Err(e) => {
                warn!("Loading settings from {} failed: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Write the state file
    pub fn save(&self, path: &Path) -> Result<()> {
        info!("Saving settings to {}", path.display());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
