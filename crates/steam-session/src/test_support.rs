//! Scripted network client doubles for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use steam_state::SteamId;
use time::OffsetDateTime;

use crate::client::{
    ChatEntryType, ClientError, ClientEvent, ClientFactory, EventStream, LogOnDetails,
    NetworkClient, PersonaState,
};
use crate::governor::Clock;
use crate::result::EResult;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How the scripted server answers the next login request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginScript {
    /// Accept with this identity.
    Succeed(SteamId),
    /// Reject with this code.
    Fail(EResult),
    /// Never answer.
    Silent,
}

/// A call observed by a [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    /// `connect` was called.
    Connect,
    /// `disconnect` was called.
    Disconnect,
    /// `log_on` was called.
    LogOn {
        /// Submitted account name.
        account_name: String,
        /// Submitted guard code.
        guard_code: Option<String>,
    },
    /// `set_presence` was called.
    SetPresence(PersonaState),
    /// `send_message` was called.
    SendMessage {
        /// Recipient identity.
        recipient: SteamId,
        /// Message text.
        text: String,
    },
    /// `request_offline_messages` was called.
    RequestOfflineMessages,
}

/// In-memory [`NetworkClient`] that answers logins from a script.
///
/// `connect` acknowledges immediately and `log_on` answers with the next
/// [`LoginScript`]; an exhausted script behaves as [`LoginScript::Silent`].
/// `disconnect` ends the event stream, while [`ScriptedClient::drop_connection`]
/// simulates a server-side drop that leaves it open.
#[derive(Debug)]
pub struct ScriptedClient {
    sender: Mutex<Option<Sender<ClientEvent>>>,
    connected: AtomicBool,
    identity: AtomicU64,
    logins: Arc<Mutex<VecDeque<LoginScript>>>,
    calls: Mutex<Vec<ClientCall>>,
}

impl ScriptedClient {
    /// Creates a client with its own login script.
    #[must_use]
    pub fn new(logins: Vec<LoginScript>) -> (Arc<Self>, EventStream) {
        Self::sharing(Arc::new(Mutex::new(logins.into())))
    }

    fn sharing(logins: Arc<Mutex<VecDeque<LoginScript>>>) -> (Arc<Self>, EventStream) {
        let (sender, events) = mpsc::channel();
        let client = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            connected: AtomicBool::new(false),
            identity: AtomicU64::new(0),
            logins,
            calls: Mutex::new(Vec::new()),
        });
        (client, events)
    }

    /// Returns every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ClientCall> {
        lock(&self.calls).clone()
    }

    /// Counts calls matching `predicate`.
    #[must_use]
    pub fn count_calls(&self, predicate: impl Fn(&ClientCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|call| predicate(call)).count()
    }

    /// Pushes an event onto the stream as if the server sent it.
    pub fn emit(&self, event: ClientEvent) {
        if let Some(sender) = lock(&self.sender).as_ref() {
            drop(sender.send(event));
        }
    }

    /// Simulates the server dropping the connection.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.identity.store(0, Ordering::SeqCst);
        self.emit(ClientEvent::Disconnected);
    }

    fn record(&self, call: ClientCall) {
        lock(&self.calls).push(call);
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if lock(&self.sender).is_some() {
            Ok(())
        } else {
            Err(ClientError::Closed)
        }
    }
}

impl NetworkClient for ScriptedClient {
    fn connect(&self) -> Result<(), ClientError> {
        self.ensure_open()?;
        self.record(ClientCall::Connect);
        self.connected.store(true, Ordering::SeqCst);
        self.emit(ClientEvent::Connected);
        Ok(())
    }

    fn disconnect(&self) {
        self.record(ClientCall::Disconnect);
        self.connected.store(false, Ordering::SeqCst);
        self.identity.store(0, Ordering::SeqCst);
        self.emit(ClientEvent::Disconnected);
        drop(lock(&self.sender).take());
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn current_identity(&self) -> SteamId {
        SteamId::new(self.identity.load(Ordering::SeqCst))
    }

    fn log_on(&self, details: &LogOnDetails) -> Result<(), ClientError> {
        self.ensure_open()?;
        self.record(ClientCall::LogOn {
            account_name: details.account_name.clone(),
            guard_code: details.guard_code.clone(),
        });
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let script = lock(&self.logins)
            .pop_front()
            .unwrap_or(LoginScript::Silent);
        match script {
            LoginScript::Succeed(steam_id) => {
                self.identity.store(steam_id.get(), Ordering::SeqCst);
                self.emit(ClientEvent::LoggedOn { steam_id });
            }
            LoginScript::Fail(result) => self.emit(ClientEvent::LogOnFailed { result }),
            LoginScript::Silent => {}
        }
        Ok(())
    }

    fn set_presence(&self, state: PersonaState) -> Result<(), ClientError> {
        self.record(ClientCall::SetPresence(state));
        Ok(())
    }

    fn send_message(
        &self,
        recipient: SteamId,
        _kind: ChatEntryType,
        text: &str,
    ) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.record(ClientCall::SendMessage {
            recipient,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn request_offline_messages(&self) -> Result<(), ClientError> {
        self.record(ClientCall::RequestOfflineMessages);
        Ok(())
    }
}

/// [`ClientFactory`] producing [`ScriptedClient`]s that share one script.
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    logins: Arc<Mutex<VecDeque<LoginScript>>>,
    opened: Mutex<Vec<Arc<ScriptedClient>>>,
    refuse: AtomicBool,
}

impl ScriptedFactory {
    /// Creates a factory answering logins from `logins` in order.
    #[must_use]
    pub fn new(logins: Vec<LoginScript>) -> Arc<Self> {
        Arc::new(Self {
            logins: Arc::new(Mutex::new(logins.into())),
            ..Self::default()
        })
    }

    /// Appends answers to the shared script.
    pub fn push_logins(&self, logins: impl IntoIterator<Item = LoginScript>) {
        lock(&self.logins).extend(logins);
    }

    /// Makes subsequent `open` calls fail.
    pub fn refuse_open(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Returns every client opened so far, oldest first.
    #[must_use]
    pub fn opened(&self) -> Vec<Arc<ScriptedClient>> {
        lock(&self.opened).clone()
    }

    /// Returns the most recently opened client.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<ScriptedClient>> {
        lock(&self.opened).last().cloned()
    }
}

impl ClientFactory for ScriptedFactory {
    fn open(&self) -> Result<(Arc<dyn NetworkClient>, EventStream), ClientError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ClientError::Remote {
                message: String::from("scripted factory refused to open a client"),
            });
        }
        let (client, events) = ScriptedClient::sharing(Arc::clone(&self.logins));
        lock(&self.opened).push(Arc::clone(&client));
        let handle: Arc<dyn NetworkClient> = client;
        Ok((handle, events))
    }
}

/// [`Clock`] that only moves when told to.
#[derive(Debug)]
pub struct ManualClock(Mutex<OffsetDateTime>);

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn starting_at(now: OffsetDateTime) -> Arc<Self> {
        Arc::new(Self(Mutex::new(now)))
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.0);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *lock(&self.0)
    }
}
