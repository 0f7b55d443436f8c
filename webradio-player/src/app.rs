//! Application wiring
//!
//! [`WebRadio`] owns one instance of every component, restores the
//! persisted state on startup and writes it back on cleanup.

use crate::api::{ApiRegistry, Args};
use crate::bus::EventBus;
use crate::decoder::DecoderSupervisor;
use crate::error::Result;
use crate::player::{DurationProbe, Mp3InfoProbe, PlaybackCoordinator};
use crate::radio::ChannelSelector;
use crate::state::SharedState;
use crate::system::SystemCommands;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};
use webradio_common::channels::load_channels;
use webradio_common::config::TomlConfig;
use webradio_common::persist::{AppSection, DecoderSection, PersistedState, RadioSection};
use webradio_common::{Channel, RadioEvent};

/// The running web radio
pub struct WebRadio {
    config: TomlConfig,
    pub state: Arc<SharedState>,
    pub bus: Arc<EventBus>,
    pub decoder: Arc<DecoderSupervisor>,
    pub player: Arc<PlaybackCoordinator>,
    pub radio: Arc<ChannelSelector>,
    pub system: SystemCommands,
    api: ApiRegistry,
}

impl WebRadio {
    /// Load channels and persisted state, build all components and start
    /// the decoder
    pub async fn open(config: TomlConfig) -> Result<Arc<Self>> {
        let persisted = PersistedState::load(&config.global.state_file);
        let channels = read_channels(&config);
        let probe = Arc::new(Mp3InfoProbe::new(config.player.probe_program.clone()));

        let app = Self::assemble(config, channels, &persisted, probe).await;
        app.decoder.start().await?;
        Ok(app)
    }

    /// Build all components from explicit inputs without starting the
    /// decoder
    pub async fn assemble(
        config: TomlConfig,
        channels: Vec<Channel>,
        persisted: &PersistedState,
        probe: Arc<dyn DurationProbe>,
    ) -> Arc<Self> {
        let state = Arc::new(SharedState::new(&persisted.webradio.mode));
        let bus = EventBus::start(&config.events, Arc::clone(&state));
        let decoder = Arc::new(DecoderSupervisor::new(
            config.decoder.clone(),
            Arc::clone(&bus),
            persisted.decoder.volume,
        ));
        let player = Arc::new(PlaybackCoordinator::new(
            config.player.clone(),
            Arc::clone(&decoder),
            Arc::clone(&bus),
            Arc::clone(&state),
            probe,
        ));
        let radio = Arc::new(ChannelSelector::new(
            channels,
            Arc::clone(&decoder),
            Arc::clone(&bus),
            Arc::clone(&state),
        ));
        let system = SystemCommands::new(config.global.debug, Arc::clone(&bus));

        radio.restore(persisted.radio.channel_nr).await;
        // Runs in the background; player operations wait for it
        let _ = player.restore(&persisted.player).await;

        Arc::new(Self {
            config,
            state,
            bus,
            decoder,
            player,
            radio,
            system,
            api: ApiRegistry::new(),
        })
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    /// Execute an API operation by name
    pub async fn exec(self: &Arc<Self>, name: &str, args: Args) -> Result<Value> {
        self.api.exec(Arc::clone(self), name, args).await
    }

    /// Names of all API operations
    pub fn api_list(&self) -> Vec<&'static str> {
        self.api.names()
    }

    /// Take over a state document pushed by a client and redistribute it
    pub async fn publish_client_state(&self, document: Value) {
        match document {
            Value::Object(map) => {
                for (key, value) in map {
                    self.state.set(&key, value).await;
                }
                self.bus.publish_state().await;
            }
            other => {
                warn!("Ignoring non-object client state");
                self.bus.publish(RadioEvent::State(other));
            }
        }
    }

    /// Current state of all components as written to the state file
    pub async fn persisted_state(&self) -> PersistedState {
        PersistedState {
            webradio: AppSection {
                mode: self.state.mode().await,
            },
            radio: RadioSection {
                channel_nr: self.radio.last().await,
            },
            player: self.player.persistent_state().await,
            decoder: DecoderSection {
                volume: Some(self.decoder.persisted_volume()),
            },
        }
    }

    pub async fn save_state(&self) -> Result<()> {
        let persisted = self.persisted_state().await;
        persisted.save(&self.config.global.state_file)?;
        Ok(())
    }

    /// Stop playback, the decoder and the event bus, then save the state
    pub async fn cleanup(&self) {
        info!("Stopping program ...");
        self.player.cancel_sequence().await;
        self.decoder.destroy().await;
        self.bus.shutdown().await;
        if let Err(e) = self.save_state().await {
            error!("Saving settings failed: {}", e);
        }
        info!("... done stopping program");
    }
}

/// Channel list; a missing or broken file yields no channels
pub fn read_channels(config: &TomlConfig) -> Vec<Channel> {
    match load_channels(&config.global.channel_file, &config.web.web_root) {
        Ok(channels) => channels,
        Err(e) => {
            error!(
                "Loading channels from {} failed: {}",
                config.global.channel_file.display(),
                e
            );
            Vec::new()
        }
    }
}
