//! Power mediator — the only component that switches relays.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use washhub_app::ports::PowerSwitch;
use washhub_domain::device::Device;
use washhub_domain::error::WashHubError;
use washhub_domain::power::{PowerSample, PowerState, PowerTarget};

use crate::config::FhemConfig;
use crate::error::FhemError;
use crate::events;
use crate::session::Session;

/// Pause before each state poll after a switch command.
const STATE_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// State polls before giving up on a switch command.
const STATE_POLL_ATTEMPTS: usize = 50;

/// [`PowerSwitch`] backed by an FHEM controller.
///
/// Owns two sessions: one for commands, serialized behind a lock, and one
/// subscribed to events, read by a background task.
pub struct FhemPowerSwitch {
    config: FhemConfig,
    /// `None` in dry-run mode.
    commands: Option<tokio::sync::Mutex<Session>>,
    events: Mutex<Option<JoinHandle<()>>>,
}

impl FhemPowerSwitch {
    /// Connect both sessions and start forwarding power samples to `samples`.
    ///
    /// With `dry_run` set nothing is opened: switching always succeeds and
    /// every state reads as unknown.
    ///
    /// # Errors
    ///
    /// Returns an [`FhemError`] when either session cannot be opened or the
    /// controller fails the handshake.
    pub async fn connect(
        config: FhemConfig,
        samples: mpsc::UnboundedSender<PowerSample>,
    ) -> Result<Self, FhemError> {
        if config.dry_run {
            tracing::warn!("dry run: device power will not be switched");
            return Ok(Self {
                config,
                commands: None,
                events: Mutex::new(None),
            });
        }

        let mut session = Session::new(&config);
        session.reconnect(&config).await?;
        let events_client = events::open(&config).await?;
        let handle = tokio::spawn(events::run(
            config.clone(),
            events_client,
            samples,
            events::Timing::default(),
        ));
        tracing::info!(addr = %config.address(), "controller connected");

        Ok(Self {
            config,
            commands: Some(tokio::sync::Mutex::new(session)),
            events: Mutex::new(Some(handle)),
        })
    }

    /// Running without a controller.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.commands.is_none()
    }

    /// Close both sessions and stop the events task.
    pub async fn shutdown(&self) {
        let events = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = events {
            handle.abort();
            tracing::debug!("events task aborted");
        }
        if let Some(commands) = &self.commands {
            commands.lock().await.close();
        }
        tracing::info!("controller connections closed");
    }

    async fn switch(&self, device: &Device, target: PowerTarget) -> Result<(), FhemError> {
        let Some(commands) = &self.commands else {
            tracing::debug!(device = %device.name, %target, "dry run, not switching");
            return Ok(());
        };
        let mut session = commands.lock().await;
        session.ensure_connected(&self.config).await?;

        let command = format!("set {} {}", device.switch_name, target.command_arg());
        let timeout = session.command_timeout(&self.config);
        if let Some(response) = session.round_trip(&command, timeout).await?
            && !response.is_empty()
        {
            tracing::error!(device = %device.name, %response, "switch command rejected");
            return Err(FhemError::UnexpectedResponse {
                device: device.name.clone(),
                response,
            });
        }

        let wanted = PowerState::from(target);
        let mut last_raw = String::new();
        for _ in 0..STATE_POLL_ATTEMPTS {
            tokio::time::sleep(STATE_POLL_INTERVAL).await;
            let raw = session
                .query_state(&device.switch_name, &self.config)
                .await?;
            let state = PowerState::from_controller(&raw);
            if state == wanted {
                tracing::info!(device = %device.name, %target, "device switched");
                return Ok(());
            }
            if state.is_definite() {
                tracing::debug!(device = %device.name, %state, "switch not applied, resending");
                session.send(&command).await?;
            }
            last_raw = raw;
        }

        tracing::error!(device = %device.name, %target, state = %last_raw, "device did not switch");
        Err(FhemError::StateDivergence {
            device: device.name.clone(),
            state: last_raw,
        })
    }

    async fn read_state(&self, device: &Device) -> Result<PowerState, FhemError> {
        let Some(commands) = &self.commands else {
            return Ok(PowerState::Unknown);
        };
        let mut session = commands.lock().await;
        let raw = session
            .query_state(&device.switch_name, &self.config)
            .await?;
        Ok(PowerState::from_controller(&raw))
    }
}

impl PowerSwitch for FhemPowerSwitch {
    async fn set_power(&self, device: &Device, target: PowerTarget) -> Result<(), WashHubError> {
        self.switch(device, target)
            .await
            .map_err(FhemError::into_domain)
    }

    async fn power_state(&self, device: &Device) -> Result<PowerState, WashHubError> {
        self.read_state(device)
            .await
            .map_err(FhemError::into_domain)
    }
}
