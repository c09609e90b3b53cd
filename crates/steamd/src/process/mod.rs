//! Daemon supervision: launching, liveness, the runtime, and shutdown.

use std::time::Duration;

mod errors;
mod guard;
mod liveness;
mod presence;
mod runtime;
mod shutdown;
mod supervisor;

pub use errors::DaemonError;
pub use liveness::{PidFileProbe, process_alive, running_pid};
pub use presence::PresenceSchedule;
pub use runtime::{DaemonIntervals, DaemonPlan, run_daemon, run_daemon_with};
pub use shutdown::{ShutdownError, ShutdownListener, ShutdownSignal, SystemShutdownSignal};
pub use supervisor::{DaemonLaunch, DaemonStatus, Started, start, status, stop};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
/// How long a freshly launched daemon is watched for an early exit.
pub(crate) const STARTUP_GRACE: Duration = Duration::from_millis(750);
/// Upper bound on joining worker threads during shutdown.
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
