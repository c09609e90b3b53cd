//! In-process view of a handle's progress.
//!
//! The translator thread reports each event here; foreground flows block on
//! the event they need instead of sleeping for a fixed interval. Every event
//! kind carries a sequence number so a waiter only reacts to events that
//! arrive after it took a [`WatchMark`].

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use steam_state::SteamId;

use crate::result::EResult;

/// Verdict of a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The server accepted the login.
    LoggedOn(SteamId),
    /// The server rejected the login.
    Failed(EResult),
}

/// Result of waiting on a [`SessionWatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait<T> {
    /// The awaited event arrived.
    Ready(T),
    /// The connection dropped first.
    Disconnected,
    /// The watch was closed because the handle was retired.
    Closed,
    /// The timeout elapsed.
    TimedOut,
}

/// Position in the event sequence taken before starting an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchMark {
    connected: u64,
    login: u64,
    disconnected: u64,
}

#[derive(Debug, Default)]
struct Progress {
    connected_seq: u64,
    login_seq: u64,
    disconnected_seq: u64,
    last_login: Option<LoginOutcome>,
    connected: bool,
    closed: bool,
}

impl Progress {
    fn mark(&self) -> WatchMark {
        WatchMark {
            connected: self.connected_seq,
            login: self.login_seq,
            disconnected: self.disconnected_seq,
        }
    }
}

/// Mutex-and-condvar record of the latest events on one handle.
#[derive(Debug, Default)]
pub struct SessionWatch {
    progress: Mutex<Progress>,
    signal: Condvar,
}

impl SessionWatch {
    /// Creates an empty watch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, update: impl FnOnce(&mut Progress)) {
        let mut progress = self.lock();
        update(&mut progress);
        self.signal.notify_all();
    }

    /// Captures the current position in the event sequence.
    #[must_use]
    pub fn mark(&self) -> WatchMark {
        self.lock().mark()
    }

    /// Returns true between a connect acknowledgement and the next drop.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Returns the most recent login verdict.
    #[must_use]
    pub fn last_login(&self) -> Option<LoginOutcome> {
        self.lock().last_login
    }

    /// Returns true when a login verdict arrived after `mark`.
    #[must_use]
    pub fn has_login_since(&self, mark: &WatchMark) -> bool {
        self.lock().login_seq > mark.login
    }

    /// Records a connect acknowledgement.
    pub fn notify_connected(&self) {
        self.publish(|progress| {
            progress.connected_seq += 1;
            progress.connected = true;
        });
    }

    /// Records a login verdict.
    pub fn notify_login(&self, outcome: LoginOutcome) {
        self.publish(|progress| {
            progress.login_seq += 1;
            progress.last_login = Some(outcome);
        });
    }

    /// Records a dropped connection.
    pub fn notify_disconnected(&self) {
        self.publish(|progress| {
            progress.disconnected_seq += 1;
            progress.connected = false;
        });
    }

    /// Wakes every waiter with [`Wait::Closed`]; later waits return at once.
    pub fn close(&self) {
        self.publish(|progress| progress.closed = true);
    }

    /// Waits for a connect acknowledgement newer than `mark`.
    #[must_use]
    pub fn wait_connected(&self, mark: &WatchMark, timeout: Duration) -> Wait<()> {
        self.wait_for(timeout, |progress| {
            if progress.connected_seq > mark.connected {
                Some(Wait::Ready(()))
            } else if progress.disconnected_seq > mark.disconnected {
                Some(Wait::Disconnected)
            } else {
                None
            }
        })
    }

    /// Waits for a login verdict newer than `mark`, giving up if the
    /// connection drops first.
    #[must_use]
    pub fn wait_login(&self, mark: &WatchMark, timeout: Duration) -> Wait<LoginOutcome> {
        self.wait_for(timeout, |progress| match progress.last_login {
            Some(outcome) if progress.login_seq > mark.login => Some(Wait::Ready(outcome)),
            _ if progress.disconnected_seq > mark.disconnected => Some(Wait::Disconnected),
            _ => None,
        })
    }

    /// Waits for the next login verdict regardless of intervening drops and
    /// advances `mark` past it.
    #[must_use]
    pub fn next_login(&self, mark: &mut WatchMark, timeout: Duration) -> Wait<LoginOutcome> {
        let observed = self.wait_for(timeout, |progress| match progress.last_login {
            Some(outcome) if progress.login_seq > mark.login => {
                Some(Wait::Ready((outcome, progress.mark())))
            }
            _ => None,
        });
        match observed {
            Wait::Ready((outcome, latest)) => {
                *mark = latest;
                Wait::Ready(outcome)
            }
            Wait::Disconnected => Wait::Disconnected,
            Wait::Closed => Wait::Closed,
            Wait::TimedOut => Wait::TimedOut,
        }
    }

    fn wait_for<T>(
        &self,
        timeout: Duration,
        mut ready: impl FnMut(&Progress) -> Option<Wait<T>>,
    ) -> Wait<T> {
        let deadline = Instant::now() + timeout;
        let mut progress = self.lock();
        loop {
            if let Some(result) = ready(&progress) {
                return result;
            }
            if progress.closed {
                return Wait::Closed;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wait::TimedOut;
            }
            progress = self
                .signal
                .wait_timeout(progress, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use rstest::rstest;

    const SHORT: Duration = Duration::from_millis(20);
    const LONG: Duration = Duration::from_secs(5);

    #[rstest]
    fn events_before_mark_are_ignored() {
        let watch = SessionWatch::new();
        watch.notify_connected();
        watch.notify_login(LoginOutcome::LoggedOn(SteamId::new(1)));
        let mark = watch.mark();

        assert_eq!(watch.wait_connected(&mark, SHORT), Wait::TimedOut);
        assert_eq!(watch.wait_login(&mark, SHORT), Wait::TimedOut);
    }

    #[rstest]
    fn waiter_wakes_on_login_from_other_thread() {
        let watch = Arc::new(SessionWatch::new());
        let mark = watch.mark();
        let publisher = Arc::clone(&watch);
        let handle = thread::spawn(move || {
            thread::sleep(SHORT);
            publisher.notify_login(LoginOutcome::Failed(EResult::ACCOUNT_LOGON_DENIED));
        });

        assert_eq!(
            watch.wait_login(&mark, LONG),
            Wait::Ready(LoginOutcome::Failed(EResult::ACCOUNT_LOGON_DENIED))
        );
        handle.join().expect("publisher panicked");
    }

    #[rstest]
    fn disconnect_ends_login_wait() {
        let watch = SessionWatch::new();
        let mark = watch.mark();
        watch.notify_disconnected();
        assert_eq!(watch.wait_login(&mark, LONG), Wait::Disconnected);
    }

    #[rstest]
    fn next_login_skips_drops_and_advances_mark() {
        let watch = SessionWatch::new();
        let mut mark = watch.mark();
        watch.notify_disconnected();
        watch.notify_login(LoginOutcome::LoggedOn(SteamId::new(5)));

        assert_eq!(
            watch.next_login(&mut mark, LONG),
            Wait::Ready(LoginOutcome::LoggedOn(SteamId::new(5)))
        );
        assert!(!watch.has_login_since(&mark));
        assert_eq!(watch.next_login(&mut mark, SHORT), Wait::TimedOut);
    }

    #[rstest]
    fn close_releases_waiters() {
        let watch = SessionWatch::new();
        let mark = watch.mark();
        watch.close();
        assert_eq!(watch.wait_connected(&mark, LONG), Wait::Closed);
    }
}
