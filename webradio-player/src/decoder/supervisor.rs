//! Decoder supervisor
//!
//! Owns the external decoder process. Commands are written to its stdin; a
//! dedicated reader task classifies its stdout and turns recognized lines
//! into bus events. Commands that expect an acknowledgement install a
//! one-shot completion slot before writing and wait on it afterwards; the
//! reader fires the slot when it sees a status line (`@P n` or `@SAMPLE`).
//!
//! All commands go through one async lock, so at most one command is ever
//! in flight and an acknowledgement can only belong to the current caller.

use super::protocol::{Command, DecoderLine};
use crate::bus::EventBus;
use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webradio_common::config::DecoderConfig;
use webradio_common::events::{EofInfo, Id3Tag, SampleInfo};
use webradio_common::RadioEvent;

/// How long `destroy()` waits for the decoder to exit
const DESTROY_TIMEOUT: Duration = Duration::from_secs(5);

type DecoderWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Playback state as acknowledged by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    /// Load issued, waiting for `@P 2`
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    /// A track is loaded (playing or paused)
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

/// Decoder process state
#[derive(Debug)]
struct DecoderStatus {
    running: bool,
    /// Stream URL or file basename of the loaded track
    track: Option<String>,
    state: PlaybackState,
    /// Whether the current track is the last one of a sequence
    last: bool,
    volume: u8,
    muted: bool,
    pre_mute_volume: u8,
}

/// State shared between the supervisor and its reader task
struct Inner {
    bus: Arc<EventBus>,
    status: Mutex<DecoderStatus>,
    pending: Mutex<Option<oneshot::Sender<()>>>,
}

impl Inner {
    fn status(&self) -> MutexGuard<'_, DecoderStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write one command and, if it expects one, wait for its acknowledgement
    async fn send(&self, writer: &mut DecoderWriter, command: Command<'_>) -> Result<()> {
        let ack = if command.expects_ack() {
            let (tx, rx) = oneshot::channel();
            *self.pending() = Some(tx);
            Some(rx)
        } else {
            None
        };

        // Checked after installing the slot: the reader clears `running`
        // before it drops the slot
        if !self.status().running {
            self.pending().take();
            return Err(Error::DecoderNotRunning);
        }

        debug!("Sending decoder command: {}", command);
        let written = async {
            writer.write_all(command.encode().as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            self.pending().take();
            return Err(e.into());
        }

        match ack {
            Some(rx) => rx.await.map_err(|_| Error::DecoderExited),
            None => Ok(()),
        }
    }

    /// Fire the completion slot of the command in flight, if any
    fn release(&self) {
        if let Some(tx) = self.pending().take() {
            let _ = tx.send(());
        }
    }

    fn handle_line(&self, line: &str) {
        let parsed = DecoderLine::parse(line);
        if parsed == DecoderLine::Frame {
            return;
        }
        debug!("Decoder output: {}", line.trim_end());

        match parsed {
            DecoderLine::IcyMeta(text) => self.bus.publish(RadioEvent::IcyMeta(text)),
            DecoderLine::IcyName(name) => self.bus.publish(RadioEvent::IcyName(name)),
            DecoderLine::Id3 { tag, value } => {
                self.bus.publish(RadioEvent::Id3(Id3Tag { tag, value }))
            }
            DecoderLine::Stopped => {
                // Only trusted while a track is loaded; otherwise it echoes a
                // stop the supervisor issued itself
                let eof = {
                    let mut status = self.status();
                    if status.state.is_active() {
                        status.state = PlaybackState::Stopped;
                        Some(EofInfo {
                            name: status.track.take(),
                            last: status.last,
                        })
                    } else {
                        None
                    }
                };
                match eof {
                    Some(eof) => {
                        self.bus.publish(RadioEvent::Eof(eof));
                        self.release();
                    }
                    None => debug!("Ignoring stray end of playback"),
                }
            }
            DecoderLine::Paused => {
                let track = {
                    let mut status = self.status();
                    status.state = PlaybackState::Paused;
                    status.track.clone()
                };
                self.bus.publish(RadioEvent::Pause(track));
                self.release();
            }
            DecoderLine::Playing => {
                let track = {
                    let mut status = self.status();
                    status.state = PlaybackState::Playing;
                    status.track.clone()
                };
                self.bus.publish(RadioEvent::Play(track));
                self.release();
            }
            DecoderLine::Sample(fraction) => {
                if let Some(elapsed) = fraction {
                    let pause = self.status().state == PlaybackState::Paused;
                    self.bus
                        .publish(RadioEvent::Sample(SampleInfo { elapsed, pause }));
                }
                self.release();
            }
            DecoderLine::Frame | DecoderLine::Other => {}
        }
    }

    /// Output ended: nothing will be acknowledged any more
    fn terminated(&self) {
        {
            let mut status = self.status();
            status.running = false;
            status.state = PlaybackState::Stopped;
            status.track = None;
        }
        // Dropping the slot fails the outstanding call with DecoderExited
        self.pending().take();
    }
}

/// Reader task: one classified line at a time until the output closes
async fn read_output<R>(inner: Arc<Inner>, reader: R)
where
    R: AsyncRead + Unpin,
{
    info!("Decoder reader started");
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => inner.handle_line(&String::from_utf8_lossy(&buf)),
            Err(e) => {
                warn!("Reading decoder output failed: {}", e);
                break;
            }
        }
    }

    inner.terminated();
    info!("Decoder reader finished");
}

/// Supervisor of the external decoder process
pub struct DecoderSupervisor {
    config: DecoderConfig,
    inner: Arc<Inner>,
    /// Command channel; holding this lock is holding the right to talk
    io: tokio::sync::Mutex<Option<DecoderWriter>>,
    child: tokio::sync::Mutex<Option<Child>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl DecoderSupervisor {
    /// Create a supervisor; `volume` is the persisted volume, if any
    pub fn new(config: DecoderConfig, bus: Arc<EventBus>, volume: Option<u8>) -> Self {
        let volume = volume.unwrap_or(config.vol_default).min(100);
        info!("Decoder volume is {}", volume);

        Self {
            inner: Arc::new(Inner {
                bus,
                status: Mutex::new(DecoderStatus {
                    running: false,
                    track: None,
                    state: PlaybackState::Stopped,
                    last: false,
                    volume,
                    muted: false,
                    pre_mute_volume: volume,
                }),
                pending: Mutex::new(None),
            }),
            config,
            io: tokio::sync::Mutex::new(None),
            child: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    /// Spawn the decoder in remote-control mode and apply the stored volume
    pub async fn start(&self) -> Result<()> {
        if self.io.lock().await.is_some() {
            return Err(Error::DecoderAlreadyStarted);
        }

        let mut args = vec!["-R".to_string()];
        args.extend(self.config.options.iter().cloned());
        info!("Starting {} with args {:?}", self.config.program, args);

        let mut child = ProcessCommand::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "decoder pipes unavailable",
                )))
            }
        };

        *self.child.lock().await = Some(child);
        self.attach(stdin, stdout).await
    }

    /// Drive an already running decoder through the given pipes.
    ///
    /// `start()` uses this for the spawned process; tests attach an
    /// in-memory decoder.
    pub async fn attach<W, R>(&self, writer: W, reader: R) -> Result<()>
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut io = self.io.lock().await;
        if io.is_some() {
            return Err(Error::DecoderAlreadyStarted);
        }

        let volume = {
            let mut status = self.inner.status();
            status.running = true;
            status.volume
        };

        let handle = tokio::spawn(read_output(Arc::clone(&self.inner), reader));
        *self.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        let mut writer: DecoderWriter = Box::new(writer);
        self.inner.send(&mut writer, Command::Volume(volume)).await?;
        self.inner.bus.publish(RadioEvent::VolSet(volume));
        *io = Some(writer);
        Ok(())
    }

    /// Play a stream URL or local file.
    ///
    /// Returns `true` if a new load was issued, `false` if the target is
    /// already loaded (for local files a position sample is requested
    /// instead, so observers see the current position).
    pub async fn play(&self, target: &str, last: bool) -> Result<bool> {
        let mut io = self.io.lock().await;
        let writer = io.as_mut().ok_or(Error::DecoderNotRunning)?;

        let is_stream = target.starts_with("http");
        let track = if is_stream {
            target.to_string()
        } else {
            Path::new(target)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| target.to_string())
        };

        let (active, same) = {
            let status = self.inner.status();
            (
                status.state.is_active(),
                status.track.as_deref() == Some(track.as_str()),
            )
        };

        if active {
            if same {
                debug!("{} is already playing", track);
                if !is_stream {
                    self.inner.send(writer, Command::Sample).await?;
                }
                return Ok(false);
            }
            // Switching targets: the old track is not the end of anything
            self.stop_locked(writer, false).await?;
        }

        info!("Start playing {}", target);
        {
            let mut status = self.inner.status();
            status.last = last;
            status.track = Some(track);
            status.state = PlaybackState::Loading;
        }

        let command = if target.ends_with(".m3u") {
            Command::LoadList(target)
        } else {
            Command::Load(target)
        };
        self.inner.send(writer, command).await?;
        Ok(true)
    }

    /// Stop the current track; no-op if nothing is loaded
    pub async fn stop(&self, last: bool) -> Result<()> {
        let mut io = self.io.lock().await;
        if !self.inner.status().state.is_active() {
            return Ok(());
        }
        let writer = io.as_mut().ok_or(Error::DecoderNotRunning)?;
        self.stop_locked(writer, last).await
    }

    async fn stop_locked(&self, writer: &mut DecoderWriter, last: bool) -> Result<()> {
        {
            let mut status = self.inner.status();
            if !status.state.is_active() {
                return Ok(());
            }
            info!("Stopping {}", status.track.as_deref().unwrap_or("-"));
            status.last = last;
        }
        self.inner.send(writer, Command::Stop).await
    }

    /// Pause; no-op without a track or when already paused
    pub async fn pause(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        {
            let status = self.inner.status();
            if status.track.is_none() || status.state == PlaybackState::Paused {
                return Ok(());
            }
        }
        let writer = io.as_mut().ok_or(Error::DecoderNotRunning)?;
        info!("Pausing playback");
        self.inner.send(writer, Command::Pause).await
    }

    /// Resume; no-op unless paused
    pub async fn resume(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        if self.inner.status().state != PlaybackState::Paused {
            return Ok(());
        }
        let writer = io.as_mut().ok_or(Error::DecoderNotRunning)?;
        info!("Resuming playback");
        self.inner.send(writer, Command::Pause).await
    }

    /// Toggle pause while a track is loaded
    pub async fn toggle(&self) -> Result<()> {
        let mut io = self.io.lock().await;
        if !self.inner.status().state.is_active() {
            return Ok(());
        }
        let writer = io.as_mut().ok_or(Error::DecoderNotRunning)?;
        info!("Toggling playback");
        self.inner.send(writer, Command::Pause).await
    }

    /// Set the volume (clamped to 0..=100) and return the stored value.
    ///
    /// The value is stored even if the decoder is not running, so it gets
    /// applied on start.
    pub async fn set_volume(&self, volume: i64) -> u8 {
        let volume = volume.clamp(0, 100) as u8;
        self.inner.status().volume = volume;

        let mut io = self.io.lock().await;
        if let Some(writer) = io.as_mut() {
            if self.inner.status().running {
                info!("Setting current volume to {}%", volume);
                if let Err(e) = self.inner.send(writer, Command::Volume(volume)).await {
                    warn!("Failed to forward volume: {}", e);
                }
            }
        }
        drop(io);

        self.inner.bus.publish(RadioEvent::VolSet(volume));
        volume
    }

    /// Raise the volume by `by` (negative counts as 0) or the configured step
    pub async fn vol_up(&self, by: Option<i64>) -> u8 {
        let amount = by.map(|by| by.max(0)).unwrap_or(self.config.vol_delta as i64);
        let volume = self.inner.status().volume as i64;
        self.set_volume(volume.saturating_add(amount)).await
    }

    /// Lower the volume by `by` (negative counts as 0) or the configured step
    pub async fn vol_down(&self, by: Option<i64>) -> u8 {
        let amount = by.map(|by| by.max(0)).unwrap_or(self.config.vol_delta as i64);
        let volume = self.inner.status().volume as i64;
        self.set_volume(volume.saturating_sub(amount)).await
    }

    /// Mute, remembering the current volume; no-op when already muted
    pub async fn mute_on(&self) -> u8 {
        {
            let mut status = self.inner.status();
            if status.muted {
                return status.volume;
            }
            status.pre_mute_volume = status.volume;
            status.muted = true;
        }
        self.set_volume(0).await
    }

    /// Restore the pre-mute volume; no-op when not muted
    pub async fn mute_off(&self) -> u8 {
        let restore = {
            let mut status = self.inner.status();
            if !status.muted {
                return status.volume;
            }
            status.muted = false;
            status.pre_mute_volume
        };
        self.set_volume(restore as i64).await
    }

    pub async fn mute_toggle(&self) -> u8 {
        if self.is_muted() {
            self.mute_off().await
        } else {
            self.mute_on().await
        }
    }

    /// Ask the decoder to quit and wait (bounded) for the process to exit
    pub async fn destroy(&self) {
        match tokio::time::timeout(DESTROY_TIMEOUT, self.io.lock()).await {
            Ok(mut io) => {
                if let Some(writer) = io.as_mut() {
                    if self.inner.status().running {
                        info!("Stopping decoder");
                        if let Err(e) = self.inner.send(writer, Command::Quit).await {
                            warn!("Failed to send quit to decoder: {}", e);
                        }
                    }
                }
            }
            Err(_) => warn!("Decoder busy, not sending quit"),
        }

        let child = self.child.lock().await.take();
        if let Some(mut child) = child {
            match tokio::time::timeout(DESTROY_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => info!("Decoder exited ({})", status),
                Ok(Err(e)) => warn!("Waiting for decoder failed: {}", e),
                Err(_) => warn!(
                    "Decoder did not exit within {}s",
                    DESTROY_TIMEOUT.as_secs()
                ),
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.status().running
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.status().state
    }

    /// Loaded stream URL or file basename
    pub fn track(&self) -> Option<String> {
        self.inner.status().track.clone()
    }

    pub fn volume(&self) -> u8 {
        self.inner.status().volume
    }

    pub fn is_muted(&self) -> bool {
        self.inner.status().muted
    }

    /// Volume to persist: the pre-mute value while muted
    pub fn persisted_volume(&self) -> u8 {
        let status = self.inner.status();
        if status.muted {
            status.pre_mute_volume
        } else {
            status.volume
        }
    }
}

impl Drop for DecoderSupervisor {
    fn drop(&mut self) {
        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
