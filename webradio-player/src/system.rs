//! Service and system lifecycle commands
//!
//! Each command publishes a `sys` event and, unless in debug mode, runs the
//! matching privileged command in the background. Failures are only logged.

use crate::bus::EventBus;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};
use webradio_common::RadioEvent;

/// Systemd unit of the service
const SERVICE_UNIT: &str = "pi-webradio.service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAction {
    Restart,
    Stop,
    Reboot,
    Halt,
}

impl SystemAction {
    /// Value of the published `sys` event
    pub fn name(self) -> &'static str {
        match self {
            SystemAction::Restart => "restart",
            SystemAction::Stop => "stop",
            SystemAction::Reboot => "reboot",
            SystemAction::Halt => "halt",
        }
    }

    /// Command line run through `sudo`
    fn command_line(self) -> Vec<&'static str> {
        match self {
            SystemAction::Restart => vec!["/bin/systemctl", "restart", SERVICE_UNIT],
            SystemAction::Stop => vec!["/bin/systemctl", "stop", SERVICE_UNIT],
            SystemAction::Reboot => vec!["/sbin/reboot"],
            SystemAction::Halt => vec!["/sbin/halt"],
        }
    }
}

pub struct SystemCommands {
    debug: bool,
    bus: Arc<EventBus>,
}

impl SystemCommands {
    pub fn new(debug: bool, bus: Arc<EventBus>) -> Self {
        Self { debug, bus }
    }

    /// Run `action` in the background and announce it
    pub fn execute(&self, action: SystemAction) {
        info!("Processing sys_{}", action.name());

        if self.debug {
            info!("Debug mode, not executing sys_{}", action.name());
        } else {
            let args = action.command_line();
            match Command::new("sudo").args(&args).spawn() {
                Ok(mut child) => {
                    tokio::spawn(async move {
                        match child.wait().await {
                            Ok(status) if status.success() => {}
                            Ok(status) => warn!("sudo {:?} exited with {}", args, status),
                            Err(e) => warn!("sudo {:?} failed: {}", args, e),
                        }
                    });
                }
                Err(e) => warn!("Failed to run sudo {:?}: {}", args, e),
            }
        }

        self.bus
            .publish(RadioEvent::Sys(action.name().to_string()));
    }
}
