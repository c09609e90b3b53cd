//! Network client backed by an external bridge process.
//!
//! The bridge owns the wire protocol. This module launches it, writes one
//! JSON command per line to its stdin, and turns each JSON line on its
//! stdout into a [`ClientEvent`]. The bridge's stderr is drained into the
//! debug log so a chatty bridge cannot block on a full pipe.
//!
//! Commands are tagged by `op`:
//!
//! ```text
//! {"op":"connect"}
//! {"op":"log_on","account_name":"alice","password":"...","guard_code":"4D6XG"}
//! {"op":"set_presence","state":"online"}
//! {"op":"send_message","recipient":76561198000000001,"kind":"chat_msg","message":"hi"}
//! {"op":"request_offline_messages"}
//! {"op":"disconnect"}
//! ```
//!
//! Events are tagged by `event`:
//!
//! ```text
//! {"event":"connected"}
//! {"event":"logged_on","steam_id":76561198000000001}
//! {"event":"log_on_failed","result":63}
//! {"event":"disconnected"}
//! {"event":"chat_message","sender":76561198000000002,"message":"hello"}
//! ```

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use serde::{Deserialize, Serialize};
use steam_state::SteamId;
use tracing::{debug, warn};

use crate::client::{
    ChatEntryType, ClientError, ClientEvent, ClientFactory, EventStream, LogOnDetails,
    NetworkClient, PersonaState,
};
use crate::result::EResult;

const BRIDGE_TARGET: &str = "steam_session::bridge";

/// Command written to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeCommand<'a> {
    /// Start connecting.
    Connect,
    /// Submit a login.
    LogOn {
        /// Account name.
        account_name: &'a str,
        /// Account password.
        password: &'a str,
        /// Guard code, when one is being submitted.
        #[serde(skip_serializing_if = "Option::is_none")]
        guard_code: Option<&'a str>,
    },
    /// Change presence.
    SetPresence {
        /// Requested presence.
        state: PersonaState,
    },
    /// Send a chat entry.
    SendMessage {
        /// Recipient identity.
        recipient: u64,
        /// Entry kind.
        kind: ChatEntryType,
        /// Entry text.
        message: &'a str,
    },
    /// Ask for messages queued while offline.
    RequestOfflineMessages,
    /// Drop the connection.
    Disconnect,
}

/// Event read from the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    /// Connection acknowledged.
    Connected,
    /// Login accepted.
    LoggedOn {
        /// Assigned identity.
        steam_id: u64,
    },
    /// Login rejected.
    LogOnFailed {
        /// Raw result code.
        result: i32,
    },
    /// Connection dropped.
    Disconnected,
    /// Chat message received.
    ChatMessage {
        /// Sender identity.
        sender: u64,
        /// Message text.
        message: String,
    },
}

impl From<BridgeEvent> for ClientEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Connected => Self::Connected,
            BridgeEvent::LoggedOn { steam_id } => Self::LoggedOn {
                steam_id: SteamId::new(steam_id),
            },
            BridgeEvent::LogOnFailed { result } => Self::LogOnFailed {
                result: EResult(result),
            },
            BridgeEvent::Disconnected => Self::Disconnected,
            BridgeEvent::ChatMessage { sender, message } => Self::ChatMessage {
                sender: SteamId::new(sender),
                message,
            },
        }
    }
}

/// [`ClientFactory`] that launches one bridge process per handle.
#[derive(Debug, Clone, Default)]
pub struct BridgeFactory {
    argv: Option<Vec<String>>,
}

impl BridgeFactory {
    /// Creates a factory for the given command line. `None` or an empty
    /// command makes every `open` fail with [`ClientError::NotConfigured`].
    #[must_use]
    pub fn new(argv: Option<Vec<String>>) -> Self {
        Self {
            argv: argv.filter(|argv| !argv.is_empty()),
        }
    }
}

impl ClientFactory for BridgeFactory {
    fn open(&self) -> Result<(Arc<dyn NetworkClient>, EventStream), ClientError> {
        let argv = self.argv.as_ref().ok_or(ClientError::NotConfigured)?;
        let (client, events) = BridgeClient::spawn(argv)?;
        let handle: Arc<dyn NetworkClient> = client;
        Ok((handle, events))
    }
}

#[derive(Debug, Default)]
struct LinkState {
    connected: AtomicBool,
    identity: AtomicU64,
}

impl LinkState {
    fn observe(&self, event: &BridgeEvent) {
        match event {
            BridgeEvent::Connected => self.connected.store(true, Ordering::SeqCst),
            BridgeEvent::LoggedOn { steam_id } => self.identity.store(*steam_id, Ordering::SeqCst),
            BridgeEvent::Disconnected => {
                self.connected.store(false, Ordering::SeqCst);
                self.identity.store(0, Ordering::SeqCst);
            }
            BridgeEvent::LogOnFailed { .. } | BridgeEvent::ChatMessage { .. } => {}
        }
    }
}

/// [`NetworkClient`] speaking to a bridge process over stdio.
#[derive(Debug)]
pub struct BridgeClient {
    program: String,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Child>,
    link: Arc<LinkState>,
}

impl BridgeClient {
    /// Launches the bridge and starts its reader threads.
    pub fn spawn(argv: &[String]) -> Result<(Arc<Self>, EventStream), ClientError> {
        let (program, args) = argv.split_first().ok_or(ClientError::NotConfigured)?;
        debug!(target: BRIDGE_TARGET, program, "launching network bridge");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ClientError::Spawn {
                program: program.clone(),
                source: Arc::new(source),
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let link = Arc::new(LinkState::default());
        let (sender, events) = mpsc::channel();

        let client = Arc::new(Self {
            program: program.clone(),
            stdin: Mutex::new(stdin),
            child: Mutex::new(child),
            link: Arc::clone(&link),
        });

        let Some(stdout) = stdout else {
            return Err(ClientError::Remote {
                message: String::from("failed to capture bridge stdout"),
            });
        };
        spawn_reader(stdout, link, sender)?;
        if let Some(stderr) = stderr {
            spawn_stderr_drain(program.clone(), stderr)?;
        }
        Ok((client, events))
    }

    fn lock_stdin(&self) -> MutexGuard<'_, Option<ChildStdin>> {
        self.stdin.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, command: &BridgeCommand<'_>) -> Result<(), ClientError> {
        let mut line = serde_json::to_vec(command).map_err(|err| ClientError::Remote {
            message: format!("failed to encode bridge command: {err}"),
        })?;
        line.push(b'\n');
        let mut stdin = self.lock_stdin();
        let pipe = stdin.as_mut().ok_or(ClientError::Closed)?;
        pipe.write_all(&line)?;
        pipe.flush()?;
        Ok(())
    }
}

fn spawn_reader(
    stdout: impl Read + Send + 'static,
    link: Arc<LinkState>,
    sender: Sender<ClientEvent>,
) -> Result<(), ClientError> {
    thread::Builder::new()
        .name(String::from("steam-bridge-events"))
        .spawn(move || read_events(stdout, &link, &sender))?;
    Ok(())
}

fn read_events(stdout: impl Read, link: &LinkState, sender: &Sender<ClientEvent>) {
    for read in BufReader::new(stdout).lines() {
        let line = match read {
            Ok(line) => line,
            Err(err) => {
                warn!(target: BRIDGE_TARGET, error = %err, "failed to read bridge output");
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let event: BridgeEvent = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(err) => {
                warn!(target: BRIDGE_TARGET, error = %err, line = trimmed, "ignoring unrecognised bridge output");
                continue;
            }
        };
        link.observe(&event);
        if sender.send(event.into()).is_err() {
            return;
        }
    }
    // A bridge that exits while connected has dropped the connection.
    if link.connected.swap(false, Ordering::SeqCst) {
        link.identity.store(0, Ordering::SeqCst);
        drop(sender.send(ClientEvent::Disconnected));
    }
    debug!(target: BRIDGE_TARGET, "bridge output closed");
}

fn spawn_stderr_drain(
    program: String,
    stderr: impl Read + Send + 'static,
) -> Result<(), ClientError> {
    thread::Builder::new()
        .name(String::from("steam-bridge-stderr"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                debug!(target: BRIDGE_TARGET, bridge = %program, stderr = %line.trim_end(), "bridge stderr");
            }
        })?;
    Ok(())
}

impl NetworkClient for BridgeClient {
    fn connect(&self) -> Result<(), ClientError> {
        self.send(&BridgeCommand::Connect)
    }

    fn disconnect(&self) {
        if let Err(err) = self.send(&BridgeCommand::Disconnect) {
            debug!(target: BRIDGE_TARGET, error = %err, "bridge already closed");
        }
        // Closing stdin tells the bridge no further commands will come.
        drop(self.lock_stdin().take());
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    fn current_identity(&self) -> SteamId {
        SteamId::new(self.link.identity.load(Ordering::SeqCst))
    }

    fn log_on(&self, details: &LogOnDetails) -> Result<(), ClientError> {
        self.send(&BridgeCommand::LogOn {
            account_name: &details.account_name,
            password: details.password.expose(),
            guard_code: details.guard_code.as_deref(),
        })
    }

    fn set_presence(&self, state: PersonaState) -> Result<(), ClientError> {
        self.send(&BridgeCommand::SetPresence { state })
    }

    fn send_message(
        &self,
        recipient: SteamId,
        kind: ChatEntryType,
        text: &str,
    ) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.send(&BridgeCommand::SendMessage {
            recipient: recipient.get(),
            kind,
            message: text,
        })
    }

    fn request_offline_messages(&self) -> Result<(), ClientError> {
        self.send(&BridgeCommand::RequestOfflineMessages)
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        drop(self.lock_stdin().take());
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(child.try_wait(), Ok(None)) {
            debug!(target: BRIDGE_TARGET, program = %self.program, "stopping network bridge");
            drop(child.kill());
        }
        drop(child.wait());
    }
}
