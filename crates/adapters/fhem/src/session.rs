//! Controller sessions — handshake, health checks and the adaptive response
//! timeout.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::FhemConfig;
use crate::error::FhemError;
use crate::line_client::LineClient;
use crate::parser::is_fhem_version;

/// Wait for each line of a `version` answer.
pub(crate) const LINE_TIMEOUT: Duration = Duration::from_secs(5);
/// A successful full check is trusted for this long.
const FULL_CHECK_INTERVAL: Duration = Duration::from_secs(20);
/// Lower bound of the end-of-response wait during the handshake.
const MIN_END_OF_RESPONSE_WAIT: Duration = Duration::from_millis(50);

/// What the `version` handshake taught us about the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Handshake {
    /// Lines in a `version` answer, blank ones included.
    pub(crate) version_lines: usize,
    /// Largest interval observed between the command and the first line or
    /// between two lines.
    pub(crate) response_floor: Duration,
}

/// Send `version` and read the multi-line answer, timing every line.
///
/// The end of the answer is detected by waiting ten times the average
/// interval for another line.
pub(crate) async fn handshake(client: &mut LineClient) -> Result<Handshake, FhemError> {
    client.drain_buffered();
    client.send("version").await?;
    let sent = Instant::now();

    let Some(mut response) = client.wait_for_response(LINE_TIMEOUT).await? else {
        return Err(FhemError::Handshake {
            response: String::new(),
        });
    };
    let first = sent.elapsed();
    let mut floor = first;
    let mut total = first;
    let mut count: u32 = 1;
    let mut last = Instant::now();

    loop {
        let wait = (total / count * 10).max(MIN_END_OF_RESPONSE_WAIT);
        let Some(line) = client.wait_for_response(wait).await? else {
            break;
        };
        let gap = last.elapsed();
        last = Instant::now();
        floor = floor.max(gap);
        total += gap;
        count += 1;
        if !line.is_empty() {
            response.push('\n');
            response.push_str(&line);
        }
    }

    if !is_fhem_version(&response) {
        return Err(FhemError::Handshake { response });
    }
    tracing::debug!(
        version_lines = count,
        response_floor_ms = floor.as_millis(),
        "controller handshake complete"
    );
    Ok(Handshake {
        version_lines: count as usize,
        response_floor: floor,
    })
}

/// Re-run `version` and check that the expected number of lines arrives and
/// identifies the controller.
pub(crate) async fn full_check(
    client: &mut LineClient,
    expected_lines: usize,
) -> Result<(), FhemError> {
    client.drain_buffered();
    client.send("version").await?;
    let mut response = String::new();
    for received in 0..expected_lines.max(1) {
        let Some(line) = client.wait_for_response(LINE_TIMEOUT).await? else {
            tracing::warn!(expected = expected_lines, received, "controller answer incomplete");
            return Err(FhemError::Handshake { response });
        };
        response.push_str(&line);
        response.push('\n');
    }
    if is_fhem_version(&response) {
        Ok(())
    } else {
        Err(FhemError::Handshake { response })
    }
}

/// Open `client` and perform the handshake.
pub(crate) async fn connect(
    client: &mut LineClient,
    config: &FhemConfig,
) -> Result<Handshake, FhemError> {
    client.open(config.connect_timeout()).await?;
    tokio::time::sleep(config.settle_delay()).await;
    match handshake(client).await {
        Ok(handshake) => Ok(handshake),
        Err(err) => {
            client.close();
            Err(err)
        }
    }
}

/// The command session: one client plus what its handshake measured.
#[derive(Debug)]
pub(crate) struct Session {
    client: LineClient,
    handshake: Handshake,
    last_full_check: Option<Instant>,
}

impl Session {
    pub(crate) fn new(config: &FhemConfig) -> Self {
        Self {
            client: LineClient::new(&config.host, config.port),
            handshake: Handshake {
                version_lines: 1,
                response_floor: Duration::ZERO,
            },
            last_full_check: None,
        }
    }

    /// Open a fresh connection and handshake.
    pub(crate) async fn reconnect(&mut self, config: &FhemConfig) -> Result<(), FhemError> {
        tracing::info!(addr = %config.address(), "opening command connection");
        self.handshake = connect(&mut self.client, config).await?;
        self.last_full_check = Some(Instant::now());
        Ok(())
    }

    /// Check the connection and reconnect when it is not usable.
    pub(crate) async fn ensure_connected(&mut self, config: &FhemConfig) -> Result<(), FhemError> {
        if self.is_healthy().await {
            return Ok(());
        }
        tracing::warn!("command connection unhealthy, reconnecting");
        self.reconnect(config).await
    }

    async fn is_healthy(&mut self) -> bool {
        if !self.client.is_alive() {
            return false;
        }
        let recently_checked = self
            .last_full_check
            .is_some_and(|at| at.elapsed() < FULL_CHECK_INTERVAL);
        if recently_checked && self.client.is_reading() {
            tracing::trace!("fast connection check passed");
            return true;
        }
        match full_check(&mut self.client, self.handshake.version_lines).await {
            Ok(()) => {
                self.last_full_check = Some(Instant::now());
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "full connection check failed");
                false
            }
        }
    }

    pub(crate) fn command_timeout(&self, config: &FhemConfig) -> Duration {
        config.command_timeout(self.handshake.response_floor)
    }

    /// Send one command and return the first answer line, if any arrives
    /// within `timeout`. Stale output is discarded first.
    pub(crate) async fn round_trip(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<Option<String>, FhemError> {
        self.client.drain_buffered();
        self.client.send(command).await?;
        self.client.wait_for_response(timeout).await
    }

    /// Send a command without waiting for an answer.
    pub(crate) async fn send(&mut self, command: &str) -> Result<(), FhemError> {
        self.client.send(command).await
    }

    /// Raw `state` reading of a switch; empty when the controller stayed
    /// silent.
    pub(crate) async fn query_state(
        &mut self,
        switch_name: &str,
        config: &FhemConfig,
    ) -> Result<String, FhemError> {
        self.ensure_connected(config).await?;
        let command = format!("get {switch_name} param state");
        let raw = self
            .round_trip(&command, config.response_timeout())
            .await?
            .unwrap_or_default();
        Ok(raw)
    }

    pub(crate) fn close(&mut self) {
        self.client.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_controller::FakeController;

    fn config(controller: &FakeController) -> FhemConfig {
        controller.config()
    }

    #[tokio::test]
    async fn should_count_version_lines_and_measure_floor() {
        let controller = FakeController::start(&["wm1_switch"]).await;
        let mut client = LineClient::new("127.0.0.1", controller.port);
        client.open(Duration::from_secs(1)).await.unwrap();

        let handshake = handshake(&mut client).await.unwrap();

        assert_eq!(handshake.version_lines, FakeController::VERSION_LINES);
        assert!(handshake.response_floor < LINE_TIMEOUT);
    }

    #[tokio::test]
    async fn should_derive_command_timeout_from_full_response_latency() {
        let controller = FakeController::start(&["wm1_switch"]).await;
        controller.set_reply_delay(Duration::from_millis(60));
        let config = FhemConfig {
            min_response_timeout_ms: 50,
            response_timeout_ms: 2000,
            ..controller.config()
        };
        let mut session = Session::new(&config);

        session.reconnect(&config).await.unwrap();

        let floor = session.handshake.response_floor;
        assert!(floor >= Duration::from_millis(60), "floor was {floor:?}");
        assert_eq!(session.handshake.version_lines, FakeController::VERSION_LINES);
        let timeout = session.command_timeout(&config);
        assert_eq!(timeout, (floor * 2).min(config.response_timeout()));
        assert!(timeout >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn should_clamp_command_timeout_to_configured_maximum() {
        let controller = FakeController::start(&[]).await;
        controller.set_reply_delay(Duration::from_millis(60));
        let config = FhemConfig {
            min_response_timeout_ms: 10,
            response_timeout_ms: 100,
            ..controller.config()
        };
        let mut session = Session::new(&config);

        session.reconnect(&config).await.unwrap();

        assert_eq!(session.command_timeout(&config), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn should_reject_non_fhem_server() {
        let controller = FakeController::start(&[]).await;
        controller.replace_version(&["Welcome to something else"]);
        let mut client = LineClient::new("127.0.0.1", controller.port);
        client.open(Duration::from_secs(1)).await.unwrap();

        let result = handshake(&mut client).await;

        assert!(matches!(result, Err(FhemError::Handshake { response }) if response.contains("something else")));
    }

    #[tokio::test]
    async fn should_pass_full_check_on_healthy_connection() {
        let controller = FakeController::start(&[]).await;
        let mut client = LineClient::new("127.0.0.1", controller.port);
        let handshake = connect(&mut client, &config(&controller)).await.unwrap();

        full_check(&mut client, handshake.version_lines).await.unwrap();
    }

    #[tokio::test]
    async fn should_fail_full_check_when_lines_are_missing() {
        let controller = FakeController::start(&[]).await;
        let mut client = LineClient::new("127.0.0.1", controller.port);
        let handshake = connect(&mut client, &config(&controller)).await.unwrap();

        controller.replace_version(&["# $Id: fhem.pl 6913 $"]);
        let result = full_check(&mut client, handshake.version_lines).await;

        assert!(matches!(result, Err(FhemError::Handshake { .. })));
    }

    #[tokio::test]
    async fn should_reconnect_session_after_controller_dropped_connection() {
        let controller = FakeController::start(&["wm1_switch"]).await;
        let config = config(&controller);
        let mut session = Session::new(&config);
        session.reconnect(&config).await.unwrap();
        assert_eq!(controller.connections(), 1);

        controller.drop_connections();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = session.query_state("wm1_switch", &config).await.unwrap();
        assert_eq!(state, "off");
        assert_eq!(controller.connections(), 2);
    }

    #[tokio::test]
    async fn should_use_fast_check_between_full_checks() {
        let controller = FakeController::start(&["wm1_switch"]).await;
        let config = config(&controller);
        let mut session = Session::new(&config);
        session.reconnect(&config).await.unwrap();

        session.query_state("wm1_switch", &config).await.unwrap();
        session.query_state("wm1_switch", &config).await.unwrap();

        assert_eq!(controller.count("version"), 1);
    }
}
