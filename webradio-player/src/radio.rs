//! Channel selector
//!
//! Maps 1-based channel numbers to stream URLs and hands them to the
//! decoder. Channel number 0 means "off" (current) or "default" (argument).

use crate::bus::EventBus;
use crate::decoder::DecoderSupervisor;
use crate::error::{Error, Result};
use crate::state::SharedState;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use webradio_common::{Channel, RadioEvent};

#[derive(Debug, Default)]
struct Selection {
    /// Playing channel, 0 when off
    current: usize,
    /// Last channel that was started, for resuming
    last: usize,
}

pub struct ChannelSelector {
    channels: Vec<Channel>,
    decoder: Arc<DecoderSupervisor>,
    bus: Arc<EventBus>,
    state: Arc<SharedState>,
    selection: Mutex<Selection>,
}

impl ChannelSelector {
    pub fn new(
        channels: Vec<Channel>,
        decoder: Arc<DecoderSupervisor>,
        bus: Arc<EventBus>,
        state: Arc<SharedState>,
    ) -> Self {
        info!("{} channels available", channels.len());
        Self {
            channels,
            decoder,
            bus,
            state,
            selection: Mutex::new(Selection::default()),
        }
    }

    /// Restore the last active channel from the state file
    pub async fn restore(&self, channel_nr: usize) {
        let last = if channel_nr <= self.channels.len() {
            channel_nr
        } else {
            0
        };
        self.selection.lock().await.last = last;
        self.state
            .update("radio", "channel_nr", json!(last))
            .await;
    }

    /// Full channel list
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Channel `nr`; 0 selects the last active channel (or the first)
    pub async fn get_channel(&self, nr: usize) -> Result<Channel> {
        let last = self.selection.lock().await.last;
        self.resolve(nr, last)
    }

    fn resolve(&self, nr: usize, last: usize) -> Result<Channel> {
        if self.channels.is_empty() {
            return Err(Error::NoChannels);
        }
        let nr = match nr {
            0 if last == 0 => 1,
            0 => last,
            nr => nr,
        };
        self.channels
            .get(nr - 1)
            .cloned()
            .ok_or(Error::InvalidChannel(nr))
    }

    /// Switch to channel `nr` (0 = default).
    ///
    /// Repeating the playing channel is a no-op that returns its record.
    pub async fn play_channel(&self, nr: usize) -> Result<Channel> {
        let mut selection = self.selection.lock().await;
        let channel = self.resolve(nr, selection.last)?;
        info!("Start playing channel {} ({})", channel.nr, channel.name);

        if self.decoder.play(&channel.url, true).await? {
            selection.current = channel.nr;
            selection.last = channel.nr;
            self.state
                .update("radio", "channel_nr", json!(channel.nr))
                .await;
            self.bus
                .publish(RadioEvent::RadioPlayChannel(channel.clone()));
        } else {
            info!("Already on channel {}", channel.nr);
        }
        Ok(channel)
    }

    /// Next channel, wrapping to the first
    pub async fn play_next(&self) -> Result<Channel> {
        let current = self.selection.lock().await.current;
        let nr = match current {
            0 => 0,
            n if n >= self.channels.len() => 1,
            n => n + 1,
        };
        info!("Switching to next channel");
        self.play_channel(nr).await
    }

    /// Previous channel, wrapping to the last
    pub async fn play_prev(&self) -> Result<Channel> {
        let current = self.selection.lock().await.current;
        let nr = match current {
            0 => 0,
            1 => self.channels.len(),
            n => n - 1,
        };
        info!("Switching to previous channel");
        self.play_channel(nr).await
    }

    /// Stop the stream; the last active channel is kept
    pub async fn off(&self) -> Result<()> {
        info!("Turning radio off");
        self.selection.lock().await.current = 0;
        self.decoder.stop(true).await
    }

    /// Play the last active channel if the radio is off
    pub async fn on(&self) -> Result<Option<Channel>> {
        if self.current().await != 0 {
            info!("Radio already on");
            return Ok(None);
        }
        info!("Turning radio on");
        self.play_channel(0).await.map(Some)
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

    /// Playing channel number, 0 when off
    pub async fn current(&self) -> usize {
        self.selection.lock().await.current
    }

    /// Last active channel number for the state file
    pub async fn last(&self) -> usize {
        self.selection.lock().await.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webradio_common::config::{DecoderConfig, EventsConfig};

    fn selector(count: usize) -> ChannelSelector {
        let state = Arc::new(SharedState::default());
        let bus = EventBus::start(&EventsConfig::default(), Arc::clone(&state));
        let decoder = Arc::new(DecoderSupervisor::new(
            DecoderConfig::default(),
            Arc::clone(&bus),
            None,
        ));
        let channels = (1..=count)
            .map(|nr| Channel {
                nr,
                name: format!("Channel {}", nr),
                url: format!("http://radio.example/{}", nr),
                logo: None,
            })
            .collect();
        ChannelSelector::new(channels, decoder, bus, state)
    }

    #[tokio::test]
    async fn test_default_channel() {
        let radio = selector(3);
        assert_eq!(radio.get_channel(0).await.unwrap().nr, 1);

        radio.restore(2).await;
        assert_eq!(radio.get_channel(0).await.unwrap().nr, 2);
    }

    #[tokio::test]
    async fn test_out_of_range_channel() {
        let radio = selector(3);
        assert!(matches!(
            radio.get_channel(4).await,
            Err(Error::InvalidChannel(4))
        ));
        assert!(matches!(
            selector(0).get_channel(0).await,
            Err(Error::NoChannels)
        ));
    }

    #[tokio::test]
    async fn test_restore_ignores_stale_channel() {
        let radio = selector(2);
        radio.restore(7).await;
        assert_eq!(radio.last().await, 0);
    }
}
