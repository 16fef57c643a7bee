//! In-process FHEM controller for tests.
//!
//! Speaks enough of the telnet protocol for the adapter: `version`,
//! `get <dev> param state`, `set <dev> on|off` and `inform on`. Switches go
//! through `set_on`/`set_off` before settling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::FhemConfig;

const SWITCH_DELAY: Duration = Duration::from_millis(30);

#[derive(Debug)]
struct SimulatedSwitch {
    state: String,
    switchable: bool,
}

#[derive(Debug)]
struct ControllerState {
    switches: HashMap<String, SimulatedSwitch>,
    set_replies: HashMap<String, String>,
    version: Vec<String>,
    commands: Vec<String>,
    connections: usize,
    reply_delay: Duration,
    offline: bool,
}

pub(crate) struct FakeController {
    pub(crate) port: u16,
    state: Arc<Mutex<ControllerState>>,
    events: broadcast::Sender<String>,
    kick: broadcast::Sender<()>,
    accept: JoinHandle<()>,
}

impl FakeController {
    pub(crate) const VERSION_LINES: usize = 3;

    pub(crate) async fn start(switches: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(ControllerState {
            switches: switches
                .iter()
                .map(|name| {
                    (
                        (*name).to_string(),
                        SimulatedSwitch {
                            state: "off".to_string(),
                            switchable: true,
                        },
                    )
                })
                .collect(),
            set_replies: HashMap::new(),
            version: vec![
                "# $Id: fhem.pl 6913 2014-11-08 10:32:44Z rudolfkoenig $".to_string(),
                "# $Id: 10_CUL_HM.pm 6863 2014-11-02 09:04:57Z martinp876 $".to_string(),
                "# $Id: 98_telnet.pm 6611 2014-09-24 07:48:32Z rudolfkoenig $".to_string(),
            ],
            commands: Vec::new(),
            connections: 0,
            reply_delay: Duration::ZERO,
            offline: false,
        }));
        let (events, _) = broadcast::channel(64);
        let (kick, _) = broadcast::channel(4);

        let accept = {
            let state = Arc::clone(&state);
            let events = events.clone();
            let kick = kick.clone();
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let offline = {
                        let mut guard = state.lock().unwrap();
                        guard.connections += 1;
                        guard.offline
                    };
                    if offline {
                        drop(socket);
                        continue;
                    }
                    tokio::spawn(handle_connection(
                        socket,
                        Arc::clone(&state),
                        events.clone(),
                        kick.subscribe(),
                    ));
                }
            })
        };

        Self {
            port,
            state,
            events,
            kick,
            accept,
        }
    }

    /// Adapter configuration pointing at this controller.
    pub(crate) fn config(&self) -> FhemConfig {
        FhemConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
            connect_timeout_ms: 1000,
            response_timeout_ms: 1000,
            min_response_timeout_ms: 50,
            settle_delay_ms: 0,
            dry_run: false,
        }
    }

    pub(crate) fn state_of(&self, switch: &str) -> String {
        self.state.lock().unwrap().switches[switch].state.clone()
    }

    pub(crate) fn set_state(&self, switch: &str, value: &str) {
        if let Some(sw) = self.state.lock().unwrap().switches.get_mut(switch) {
            sw.state = value.to_string();
        }
    }

    /// The relay ignores every switch command from now on.
    pub(crate) fn block(&self, switch: &str) {
        if let Some(sw) = self.state.lock().unwrap().switches.get_mut(switch) {
            sw.switchable = false;
        }
    }

    /// Answer `set <switch> …` with `reply` instead of switching.
    pub(crate) fn reject_set(&self, switch: &str, reply: &str) {
        self.state
            .lock()
            .unwrap()
            .set_replies
            .insert(switch.to_string(), reply.to_string());
    }

    /// Pause before writing each reply line.
    pub(crate) fn set_reply_delay(&self, delay: Duration) {
        self.state.lock().unwrap().reply_delay = delay;
    }

    /// While offline, connections are accepted and closed right away.
    pub(crate) fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    pub(crate) fn replace_version(&self, lines: &[&str]) {
        self.state.lock().unwrap().version = lines.iter().map(|l| (*l).to_string()).collect();
    }

    /// Send an event line to every `inform on` connection.
    pub(crate) fn emit(&self, line: &str) {
        let _ = self.events.send(line.to_string());
    }

    /// Wait until `count` connections receive events.
    pub(crate) async fn wait_for_subscribers(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while self.events.receiver_count() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    pub(crate) fn subscribers(&self) -> usize {
        self.events.receiver_count()
    }

    /// Close every open connection from the server side.
    pub(crate) fn drop_connections(&self) {
        let _ = self.kick.send(());
    }

    pub(crate) fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    pub(crate) fn count(&self, command: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }
}

impl Drop for FakeController {
    fn drop(&mut self) {
        self.accept.abort();
        let _ = self.kick.send(());
    }
}

async fn handle_connection(
    socket: TcpStream,
    state: Arc<Mutex<ControllerState>>,
    events: broadcast::Sender<String>,
    mut kick: broadcast::Receiver<()>,
) {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut informed: Option<broadcast::Receiver<String>> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    break;
                };
                let replies = respond(&state, line.trim(), &mut informed, &events);
                let delay = state.lock().unwrap().reply_delay;
                for reply in replies {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if write_half.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
            event = next_event(&mut informed) => {
                if let Some(event) = event
                    && write_half.write_all(format!("{event}\n").as_bytes()).await.is_err()
                {
                    return;
                }
            }
            _ = kick.recv() => break,
        }
    }
}

async fn next_event(informed: &mut Option<broadcast::Receiver<String>>) -> Option<String> {
    match informed {
        Some(rx) => rx.recv().await.ok(),
        None => std::future::pending().await,
    }
}

fn respond(
    state: &Arc<Mutex<ControllerState>>,
    command: &str,
    informed: &mut Option<broadcast::Receiver<String>>,
    events: &broadcast::Sender<String>,
) -> Vec<String> {
    if command.is_empty() {
        return Vec::new();
    }
    let mut guard = state.lock().unwrap();
    guard.commands.push(command.to_string());
    let parts: Vec<&str> = command.split_whitespace().collect();

    match parts.as_slice() {
        ["version"] => guard.version.clone(),
        ["inform", "on"] => {
            if informed.is_none() {
                *informed = Some(events.subscribe());
            }
            Vec::new()
        }
        ["get", name, "param", "state"] => match guard.switches.get(*name) {
            Some(sw) => vec![sw.state.clone()],
            None => vec![format!("unknown device '{name}'")],
        },
        ["set", name, target @ ("on" | "off")] => {
            if let Some(reply) = guard.set_replies.get(*name) {
                return vec![reply.clone()];
            }
            let Some(sw) = guard.switches.get_mut(*name) else {
                return vec![format!("unknown device '{name}'")];
            };
            if sw.switchable {
                sw.state = format!("set_{target}");
                let state = Arc::clone(state);
                let name = (*name).to_string();
                let target = (*target).to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(SWITCH_DELAY).await;
                    if let Some(sw) = state.lock().unwrap().switches.get_mut(&name) {
                        sw.state = target;
                    }
                });
            }
            Vec::new()
        }
        _ => vec!["unknown command".to_string()],
    }
}
