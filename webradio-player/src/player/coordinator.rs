//! Playback coordinator
//!
//! Plays local files from the directory tree below the root directory. A
//! whole directory is played by a sequencing task that subscribes to the
//! event bus and advances on the decoder's own `eof` events.
//!
//! The session lock guards the current directory, its cached listing and the
//! selected file. It is held across resolve-and-relist only, never across a
//! decoder call or the sequencing task's run.

use super::listing::{
    file_name, is_contained, normalize, relative_dir, scan_directory, DirectoryListing, PARENT_DIR,
};
use super::probe::DurationProbe;
use crate::bus::EventBus;
use crate::decoder::DecoderSupervisor;
use crate::error::{Error, Result};
use crate::state::SharedState;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webradio_common::config::{home_dir, PlayerConfig};
use webradio_common::events::FileInfo;
use webradio_common::human_time::format_duration;
use webradio_common::persist::PlayerSection;
use webradio_common::RadioEvent;

/// Bus identity of the sequencing task
pub const SEQUENCER_ID: &str = "_play_dir";

struct Session {
    dir: PathBuf,
    file: Option<PathBuf>,
    listing: Option<DirectoryListing>,
}

struct Sequence {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sequence {
    async fn cancel_and_wait(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!("Directory play task failed: {}", e);
        }
    }
}

/// Coordinator of local file playback
pub struct PlaybackCoordinator {
    root: PathBuf,
    config: PlayerConfig,
    decoder: Arc<DecoderSupervisor>,
    bus: Arc<EventBus>,
    state: Arc<SharedState>,
    probe: Arc<dyn DurationProbe>,
    session: Mutex<Session>,
    sequence: Mutex<Option<Sequence>>,
    ready: watch::Sender<bool>,
}

impl PlaybackCoordinator {
    pub fn new(
        config: PlayerConfig,
        decoder: Arc<DecoderSupervisor>,
        bus: Arc<EventBus>,
        state: Arc<SharedState>,
        probe: Arc<dyn DurationProbe>,
    ) -> Self {
        let mut root = absolute(&config.root_dir);
        if !root.is_dir() {
            let fallback = home_dir();
            warn!(
                "Player root {} does not exist, using {}",
                root.display(),
                fallback.display()
            );
            root = fallback;
        }
        let default_dir = absolute(&config.default_dir());
        let dir = if is_contained(&root, &default_dir) {
            default_dir
        } else {
            root.clone()
        };

        info!("Player root directory: {}", root.display());
        info!("Player default directory: {}", dir.display());

        let (ready, _) = watch::channel(true);
        Self {
            root,
            config,
            decoder,
            bus,
            state,
            probe,
            session: Mutex::new(Session {
                dir,
                file: None,
                listing: None,
            }),
            sequence: Mutex::new(None),
            ready,
        }
    }

    /// Root directory (fixed for the lifetime of the coordinator)
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Restore the persisted directory and file.
    ///
    /// Validation runs in the background because the directory may live on
    /// media that is not mounted yet; operations wait until it is done.
    pub async fn restore(self: &Arc<Self>, persisted: &PlayerSection) -> JoinHandle<()> {
        self.ready.send_replace(false);

        let dir = {
            let mut session = self.session.lock().await;
            if let Some(dir) = &persisted.player_dir {
                session.dir = absolute(dir);
            }
            session.file = persisted.player_file.as_deref().map(absolute);
            debug!("Restored directory {}", session.dir.display());
            session.dir.clone()
        };
        self.state
            .update("player", "last_dir", json!(relative_dir(&self.root, &dir)))
            .await;

        let this = Arc::clone(self);
        tokio::spawn(async move { this.initialize().await })
    }

    async fn initialize(&self) {
        let dir = self.session.lock().await.dir.clone();

        info!("Waiting for {}", dir.display());
        let mut remaining = self.config.wait_dir;
        while remaining > 0 && !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::time::sleep(Duration::from_secs(1)).await;
            remaining -= 1;
        }

        {
            let mut session = self.session.lock().await;
            if !self.is_valid_dir(&session.dir) {
                let default_dir = absolute(&self.config.default_dir());
                session.dir = if self.is_valid_dir(&default_dir) {
                    default_dir
                } else {
                    warn!("Using {} as fallback", self.root.display());
                    self.root.clone()
                };
            }
            if let Some(file) = &session.file {
                if !self.is_valid_file(file) {
                    warn!("Dropping persisted file {}", file.display());
                    session.file = None;
                }
            }
            if let Err(e) = self.relist(&mut session).await {
                warn!("Failed to list {}: {}", session.dir.display(), e);
            }

            info!("Current directory: {}", session.dir.display());
            info!(
                "Current file: {}",
                session
                    .file
                    .as_deref()
                    .map(|f| f.display().to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }

        self.ready.send_replace(true);
    }

    async fn wait_ready(&self) {
        let mut ready = self.ready.subscribe();
        let _ = ready.wait_for(|ready| *ready).await;
    }

    fn is_valid_dir(&self, dir: &Path) -> bool {
        if !dir.is_dir() {
            warn!("{} is not a directory", dir.display());
            return false;
        }
        if !is_contained(&self.root, dir) {
            warn!("{} is not below {}", dir.display(), self.root.display());
            return false;
        }
        true
    }

    fn is_valid_file(&self, file: &Path) -> bool {
        if !file.is_file() {
            warn!("{} does not exist", file.display());
            return false;
        }
        file.parent().is_some_and(|dir| self.is_valid_dir(dir))
    }

    /// Rebuild the listing of the session's directory
    async fn relist(&self, session: &mut Session) -> Result<()> {
        debug!("Collecting directory info for {}", session.dir.display());
        let (sub_dirs, files) = scan_directory(&session.dir, &self.config.extensions).await?;

        let mut dirs = Vec::with_capacity(sub_dirs.len() + 1);
        if session.dir != self.root {
            dirs.push(PARENT_DIR.to_string());
        }
        dirs.extend(sub_dirs);

        // Keep the selection if it is still in this directory
        let selected = session
            .file
            .as_deref()
            .filter(|f| f.parent() == Some(session.dir.as_path()))
            .map(file_name)
            .filter(|name| files.contains(name));
        let cur_file = match selected {
            Some(name) => Some(name),
            // Without playable files the previous selection stays playable
            None => match files.first() {
                Some(first) => {
                    session.file = Some(session.dir.join(first));
                    self.state
                        .update("player", "last_file", json!(first))
                        .await;
                    Some(first.clone())
                }
                None => None,
            },
        };

        let mut dur = Vec::with_capacity(files.len());
        for name in &files {
            let path = session.dir.join(name);
            let seconds = match self.probe.duration(&path).await {
                Ok(seconds) => seconds,
                Err(e) => {
                    warn!("{}", e);
                    0
                }
            };
            dur.push((seconds, format_duration(seconds)));
        }

        session.listing = Some(DirectoryListing {
            dirs,
            files,
            dur,
            cur_file,
            cur_dir: relative_dir(&self.root, &session.dir),
        });
        Ok(())
    }

    /// Select a directory and return its listing.
    ///
    /// A leading `/` resolves against the root, anything else against the
    /// current directory. `None` (or empty) re-lists the current directory,
    /// using the cache when present.
    pub async fn select_directory(&self, dir: Option<&str>) -> Result<DirectoryListing> {
        self.wait_ready().await;
        let mut session = self.session.lock().await;

        let target = match dir.filter(|d| !d.is_empty()) {
            None => session.dir.clone(),
            Some(dir) => {
                let resolved = match dir.strip_prefix('/') {
                    Some(rel) => normalize(&self.root.join(rel)),
                    None => normalize(&session.dir.join(dir)),
                };
                debug!("Resolved directory {} to {}", dir, resolved.display());
                if !self.is_valid_dir(&resolved) {
                    return Err(Error::InvalidDirectory(resolved));
                }
                resolved
            }
        };

        let cache_valid = target == session.dir && session.listing.is_some();
        session.dir = target;

        let cur_dir = relative_dir(&self.root, &session.dir);
        self.bus.publish(RadioEvent::DirSelect(cur_dir.clone()));
        self.state
            .update("player", "last_dir", json!(cur_dir))
            .await;

        if cache_valid {
            debug!("Using cached directory info for {}", session.dir.display());
        } else {
            self.relist(&mut session).await?;
        }

        Ok(session.listing.clone().unwrap_or_default())
    }

    /// Play a file (relative to the current directory unless absolute), or
    /// the selected file if `file` is `None`.
    ///
    /// The `file_info` event is published even if the file already plays.
    pub async fn play_file(&self, file: Option<&str>, last: bool) -> Result<FileInfo> {
        self.wait_ready().await;

        let path = {
            let mut session = self.session.lock().await;
            if let Some(file) = file.filter(|f| !f.is_empty()) {
                let path = Path::new(file);
                let path = if path.is_absolute() {
                    normalize(path)
                } else {
                    normalize(&session.dir.join(path))
                };
                if !self.is_valid_file(&path) {
                    return Err(Error::InvalidFile(path));
                }
                session.file = Some(path);
            }

            let path = session.file.clone().ok_or(Error::NoDefaultFile)?;
            let in_current_dir = path.parent() == Some(session.dir.as_path());
            if let Some(listing) = session.listing.as_mut().filter(|_| in_current_dir) {
                listing.cur_file = Some(file_name(&path));
            }
            path
        };

        let total = self.probe.duration(&path).await?;
        let info = FileInfo {
            name: file_name(&path),
            total,
            total_pretty: format_duration(total),
            last,
        };
        self.bus.publish(RadioEvent::FileInfo(info.clone()));

        if self.decoder.play(&path.to_string_lossy(), last).await? {
            self.state
                .update("player", "last_file", json!(info.name))
                .await;
        }
        self.state
            .update("player", "time", json!([0, info.total, info.total_pretty]))
            .await;

        Ok(info)
    }

    /// Play the files of the current directory in order, optionally
    /// starting at `start`. Replaces a running sequence.
    pub async fn play_directory(self: &Arc<Self>, start: Option<&str>) -> Result<()> {
        self.wait_ready().await;

        let mut sequence = self.sequence.lock().await;
        if let Some(previous) = sequence.take() {
            info!("Stopping running directory play");
            previous.cancel_and_wait().await;
        }

        let files: Vec<PathBuf> = {
            let mut session = self.session.lock().await;
            if session.listing.is_none() {
                self.relist(&mut session).await?;
            }
            let listed = session
                .listing
                .as_ref()
                .map(|listing| listing.files.as_slice())
                .unwrap_or_default();

            let listed = match start.filter(|s| !s.is_empty()) {
                None => listed,
                Some(start) => {
                    let index = listed
                        .iter()
                        .position(|f| f == start)
                        .ok_or_else(|| Error::UnknownStartFile(start.to_string()))?;
                    info!("Starting directory play with {} (index {})", start, index);
                    &listed[index..]
                }
            };
            listed.iter().map(|name| session.dir.join(name)).collect()
        };

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(self).run_sequence(files, cancel.clone()));
        *sequence = Some(Sequence { cancel, handle });
        Ok(())
    }

    /// Sequencing task: one file at a time, advancing on its `eof`
    async fn run_sequence(self: Arc<Self>, files: Vec<PathBuf>, cancel: CancellationToken) {
        let events = self.bus.subscribe(SEQUENCER_ID).await;
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let last_index = files.len().saturating_sub(1);

        'files: for (index, path) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            let name = file_name(path);
            info!("Playing next file {}", name);
            if let Err(e) = self
                .play_file(Some(&path.to_string_lossy()), index == last_index)
                .await
            {
                warn!("Directory play aborted: {}", e);
                break;
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break 'files,
                    received = tokio::time::timeout(poll_interval, events.recv()) => match received {
                        Ok(Some(event)) => {
                            if let RadioEvent::Eof(eof) = &event.event {
                                if eof.name.as_deref() == Some(name.as_str()) {
                                    debug!("Processing eof for {}", name);
                                    break;
                                }
                            }
                        }
                        Ok(None) => {
                            warn!("Directory play lost its event subscription");
                            break 'files;
                        }
                        Err(_) => {}
                    },
                }
            }
        }

        info!("Stopping directory play");
        self.bus.unsubscribe(SEQUENCER_ID);
        if let Err(e) = self.decoder.stop(true).await {
            warn!("Failed to stop decoder: {}", e);
        }
    }

    /// Cancel a running directory sequence and wait for it.
    ///
    /// Returns whether a sequence was running.
    pub async fn cancel_sequence(&self) -> bool {
        let mut sequence = self.sequence.lock().await;
        match sequence.take() {
            Some(running) if !running.handle.is_finished() => {
                running.cancel_and_wait().await;
                true
            }
            _ => false,
        }
    }

    /// Whether a directory sequence is in progress
    pub async fn is_sequencing(&self) -> bool {
        self.sequence
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Stop playback; a running sequence is cancelled (and stops the decoder)
    pub async fn stop(&self) -> Result<()> {
        if !self.cancel_sequence().await {
            self.decoder.stop(true).await?;
        }
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.decoder.pause().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.decoder.resume().await
    }

    pub async fn toggle(&self) -> Result<()> {
        self.decoder.toggle().await
    }

    /// Current directory and file for the state file
    pub async fn persistent_state(&self) -> PlayerSection {
        let session = self.session.lock().await;
        PlayerSection {
            player_dir: Some(session.dir.clone()),
            player_file: session.file.clone(),
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        match std::env::current_dir() {
            Ok(cwd) => normalize(&cwd.join(path)),
            Err(_) => normalize(path),
        }
    }
}
