//! API dispatch table
//!
//! Fixed mapping from operation name to handler, built once at startup.
//! Arguments arrive as string key/value pairs (HTTP query parameters) and
//! are parsed by the handlers.

use crate::app::WebRadio;
use crate::error::{Error, Result};
use crate::system::SystemAction;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Operation arguments
pub type Args = HashMap<String, String>;

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
type Handler = Box<dyn Fn(Arc<WebRadio>, Args) -> HandlerFuture + Send + Sync>;

pub struct ApiRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl ApiRegistry {
    /// Table with every operation
    pub fn new() -> Self {
        let mut api = Self {
            handlers: HashMap::new(),
        };

        // General
        api.register("get_version", |app, _| async move {
            Ok(json!(app.state.version()))
        });
        api.register("get_state", |app, _| async move {
            Ok(app.state.snapshot().await)
        });
        api.register("get_api_list", |app, _| async move {
            Ok(json!(app.api_list()))
        });

        // Radio
        api.register("radio_on", |app, _| async move {
            app.player.cancel_sequence().await;
            to_value(app.radio.on().await?)
        });
        api.register("radio_off", |app, _| async move {
            app.radio.off().await?;
            Ok(Value::Null)
        });
        api.register("radio_pause", |app, _| async move {
            app.radio.pause().await?;
            Ok(Value::Null)
        });
        api.register("radio_resume", |app, _| async move {
            app.radio.resume().await?;
            Ok(Value::Null)
        });
        api.register("radio_toggle", |app, _| async move {
            app.radio.toggle().await?;
            Ok(Value::Null)
        });
        api.register("radio_get_channels", |app, _| async move {
            to_value(app.radio.channels())
        });
        api.register("radio_get_channel", |app, args| async move {
            let nr = parse_arg::<usize>(&args, "nr")?.unwrap_or(0);
            to_value(app.radio.get_channel(nr).await?)
        });
        api.register("radio_play_channel", |app, args| async move {
            let nr = parse_arg::<usize>(&args, "nr")?.unwrap_or(0);
            app.player.cancel_sequence().await;
            to_value(app.radio.play_channel(nr).await?)
        });
        api.register("radio_play_next", |app, _| async move {
            app.player.cancel_sequence().await;
            to_value(app.radio.play_next().await?)
        });
        api.register("radio_play_prev", |app, _| async move {
            app.player.cancel_sequence().await;
            to_value(app.radio.play_prev().await?)
        });

        // Player
        api.register("player_play_file", |app, args| async move {
            let last = parse_bool(&args, "last")?.unwrap_or(true);
            to_value(app.player.play_file(str_arg(&args, "file"), last).await?)
        });
        api.register("player_stop", |app, _| async move {
            app.player.stop().await?;
            Ok(Value::Null)
        });
        api.register("player_pause", |app, _| async move {
            app.player.pause().await?;
            Ok(Value::Null)
        });
        api.register("player_resume", |app, _| async move {
            app.player.resume().await?;
            Ok(Value::Null)
        });
        api.register("player_toggle", |app, _| async move {
            app.player.toggle().await?;
            Ok(Value::Null)
        });
        api.register("player_select_dir", |app, args| async move {
            to_value(app.player.select_directory(str_arg(&args, "dir")).await?)
        });
        api.register("player_play_dir", |app, args| async move {
            app.player.play_directory(str_arg(&args, "start")).await?;
            Ok(Value::Null)
        });

        // Volume
        api.register("vol_up", |app, args| async move {
            let by = parse_arg::<i64>(&args, "by")?;
            Ok(json!(app.decoder.vol_up(by).await))
        });
        api.register("vol_down", |app, args| async move {
            let by = parse_arg::<i64>(&args, "by")?;
            Ok(json!(app.decoder.vol_down(by).await))
        });
        api.register("vol_set", |app, args| async move {
            let volume = parse_arg::<i64>(&args, "val")?
                .ok_or_else(|| Error::BadRequest("missing argument val".to_string()))?;
            Ok(json!(app.decoder.set_volume(volume).await))
        });
        api.register("vol_mute_on", |app, _| async move {
            Ok(json!(app.decoder.mute_on().await))
        });
        api.register("vol_mute_off", |app, _| async move {
            Ok(json!(app.decoder.mute_off().await))
        });
        api.register("vol_mute_toggle", |app, _| async move {
            Ok(json!(app.decoder.mute_toggle().await))
        });

        // System
        for (name, action) in [
            ("sys_restart", SystemAction::Restart),
            ("sys_stop", SystemAction::Stop),
            ("sys_reboot", SystemAction::Reboot),
            ("sys_halt", SystemAction::Halt),
        ] {
            api.register(name, move |app, _| async move {
                app.system.execute(action);
                Ok(Value::Null)
            });
        }

        api
    }

    fn register<F, Fut>(&mut self, name: &'static str, handler: F)
    where
        F: Fn(Arc<WebRadio>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.handlers
            .insert(name, Box::new(move |app, args| Box::pin(handler(app, args)) as HandlerFuture));
    }

    /// Run operation `name`
    pub async fn exec(&self, app: Arc<WebRadio>, name: &str, args: Args) -> Result<Value> {
        match self.handlers.get(name) {
            Some(handler) => {
                info!("Executing {}({:?})", name, args);
                handler(app, args).await
            }
            None => {
                debug!("Unknown API {}", name);
                Err(Error::NotImplemented(name.to_string()))
            }
        }
    }

    /// Sorted operation names
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }
}

impl Default for ApiRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::Common(e.into()))
}

fn str_arg<'a>(args: &'a Args, key: &str) -> Option<&'a str> {
    args.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn parse_arg<T: FromStr>(args: &Args, key: &str) -> Result<Option<T>> {
    match str_arg(args, key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::BadRequest(format!("invalid value for {}: {}", key, value))),
    }
}

fn parse_bool(args: &Args, key: &str) -> Result<Option<bool>> {
    match str_arg(args, key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(Some(false)),
        Some(v) => Err(Error::BadRequest(format!("invalid value for {}: {}", key, v))),
    }
}
