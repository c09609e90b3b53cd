//! Turns termination signals into cancellation of the daemon's loops.

use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use steam_session::CancelToken;
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Source of the request to shut the daemon down.
pub trait ShutdownSignal: Send + Sync {
    /// Arranges for `token` to be cancelled when shutdown is requested.
    fn listen(&self, token: &CancelToken) -> Result<ShutdownListener, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Background listener returned by [`ShutdownSignal::listen`].
///
/// Closing it stops the listener thread even when no signal arrived.
#[derive(Default)]
pub struct ShutdownListener {
    handle: Option<Handle>,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for ShutdownListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownListener")
            .field("listening", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

impl ShutdownListener {
    /// A listener with nothing to stop; shutdown comes from the token alone.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Stops listening and joins the listener thread.
    pub fn close(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.close();
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            debug!(target: PROCESS_TARGET, "signal listener panicked");
        }
    }
}

/// Listener for SIGTERM, SIGINT, SIGQUIT, and SIGHUP.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn listen(&self, token: &CancelToken) -> Result<ShutdownListener, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let token = token.clone();
        let thread = thread::Builder::new()
            .name(String::from("steamd-signals"))
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    info!(target: PROCESS_TARGET, signal, "shutdown signal received");
                }
                token.cancel();
            })
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(ShutdownListener {
            handle: Some(handle),
            thread: Some(thread),
        })
    }
}
