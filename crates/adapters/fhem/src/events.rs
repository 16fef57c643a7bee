//! Events channel — a second connection subscribed with `inform on`.
//!
//! Power readings are parsed out of the event stream and forwarded to the
//! lifecycle manager over a channel.

use std::time::Duration;

use tokio::sync::mpsc;

use washhub_domain::power::PowerSample;

use crate::config::FhemConfig;
use crate::error::FhemError;
use crate::line_client::LineClient;
use crate::parser::parse_power_event;
use crate::session;

/// Silence after which the events connection is considered dead.
const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Pause between two failed reconnection attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Timeouts of the events loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timing {
    pub(crate) idle_timeout: Duration,
    pub(crate) reconnect_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            idle_timeout: IDLE_TIMEOUT,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

/// Open an events connection: handshake, then subscribe.
pub(crate) async fn open(config: &FhemConfig) -> Result<LineClient, FhemError> {
    tracing::info!(addr = %config.address(), "opening events connection");
    let mut client = LineClient::new(&config.host, config.port);
    session::connect(&mut client, config).await?;
    client.send("inform on").await?;
    Ok(client)
}

/// Receive events until the sample receiver goes away, reconnecting whenever
/// the connection breaks or stays silent too long.
pub(crate) async fn run(
    config: FhemConfig,
    mut client: LineClient,
    samples: mpsc::UnboundedSender<PowerSample>,
    timing: Timing,
) {
    loop {
        match client.wait_for_response(timing.idle_timeout).await {
            Ok(Some(line)) => {
                tracing::trace!(%line, "controller event");
                if let Some(sample) = parse_power_event(&line) {
                    tracing::debug!(power_name = %sample.power_name, watts = sample.watts, "power sample");
                    if samples.send(sample).is_err() {
                        tracing::debug!("power sample receiver dropped, stopping events");
                        return;
                    }
                }
                continue;
            }
            Ok(None) => {
                tracing::warn!("no controller events for too long, reconnecting");
            }
            Err(err) => {
                tracing::warn!(error = %err, "events connection broken, reconnecting");
            }
        }
        client.close();
        client = reopen(&config, timing.reconnect_delay).await;
    }
}

async fn reopen(config: &FhemConfig, delay: Duration) -> LineClient {
    loop {
        match open(config).await {
            Ok(client) => return client,
            Err(err) => {
                tracing::error!(error = %err, "failed to open events connection");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
