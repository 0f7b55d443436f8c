//! Fully wired web radio over a temporary music tree
//!
//! Layout of the music root:
//! ```text
//! a.mp3  b.mp3  c.mp3  notes.txt
//! sub/d.mp3
//! ```

use super::FakeDecoder;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use webradio_common::config::TomlConfig;
use webradio_common::persist::PersistedState;
use webradio_common::{BusEvent, Channel};
use webradio_player::player::DurationProbe;
use webradio_player::{Error, Result, Subscription, WebRadio};

/// Every file lasts the same; `broken.mp3` cannot be probed
pub struct FixedProbe(pub u64);

#[async_trait]
impl DurationProbe for FixedProbe {
    async fn duration(&self, path: &Path) -> Result<u64> {
        if path.ends_with("broken.mp3") {
            return Err(Error::Probe {
                path: path.to_path_buf(),
                reason: "unreadable".to_string(),
            });
        }
        Ok(self.0)
    }
}

pub struct TestRadio {
    pub app: Arc<WebRadio>,
    pub decoder: FakeDecoder,
    pub root: PathBuf,
    _dir: TempDir,
}

impl TestRadio {
    pub async fn start() -> Self {
        Self::with_state(PersistedState::default()).await
    }

    /// Start with a persisted state; relative player paths are resolved
    /// against the music root
    pub async fn with_state(mut persisted: PersistedState) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let base = std::fs::canonicalize(dir.path()).expect("Failed to resolve temp dir");
        let root = base.join("music");
        create_music_tree(&root);

        let mut config = TomlConfig::default();
        config.global.debug = true;
        config.global.state_file = base.join("state.json");
        config.global.channel_file = base.join("channels.json");
        config.web.web_root = base.join("web");
        config.player.root_dir = root.clone();
        config.player.wait_dir = 0;
        config.player.poll_interval_ms = 20;

        persisted.player.player_dir = persisted.player.player_dir.map(|d| root.join(d));
        persisted.player.player_file = persisted.player.player_file.map(|f| root.join(f));

        let app = WebRadio::assemble(
            config,
            test_channels(),
            &persisted,
            Arc::new(FixedProbe(185)),
        )
        .await;
        let decoder = FakeDecoder::attach(&app.decoder).await;

        Self {
            app,
            decoder,
            root,
            _dir: dir,
        }
    }

    /// Subscribe and skip the version and state seed events
    pub async fn observe(&self, id: &str) -> Arc<Subscription> {
        let events = self.app.bus.subscribe(id).await;
        for expected in ["version", "state"] {
            let event = events.recv().await.expect("Missing seed event");
            assert_eq!(event.kind(), expected);
        }
        events
    }
}

pub fn test_channels() -> Vec<Channel> {
    (1..=3)
        .map(|nr| Channel {
            nr,
            name: format!("Channel {}", nr),
            url: format!("http://radio.example/{}", nr),
            logo: None,
        })
        .collect()
}

fn create_music_tree(root: &Path) {
    std::fs::create_dir_all(root.join("sub")).expect("Failed to create music tree");
    for file in ["a.mp3", "b.mp3", "c.mp3", "notes.txt", "sub/d.mp3"] {
        std::fs::write(root.join(file), b"ID3").expect("Failed to create music file");
    }
}

/// Next event of `kind`, skipping everything else; panics after 5 seconds
pub async fn next_event(events: &Subscription, kind: &str) -> Arc<BusEvent> {
    let wait = async {
        loop {
            match events.recv().await {
                Some(event) if event.kind() == kind => return event,
                Some(_) => continue,
                None => panic!("Subscription ended while waiting for {}", kind),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for {}", kind))
}

/// Poll `condition` until it holds; panics after 5 seconds
pub async fn eventually(what: &str, condition: impl Fn() -> bool) {
    let wait = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for {}", what))
}
