//! Background daemon for the `steam` CLI.
//!
//! The daemon keeps one authenticated connection open so the account stays
//! online and incoming chat messages are captured. It shares nothing with the
//! CLI but the state directory:
//!
//! - `daemon.pid` names the live process; liveness is a `kill(pid, 0)` probe.
//! - `daemon_state.json` is rewritten by a heartbeat every few seconds.
//! - `session.json` and `rate_limit.json` are updated by the same translator
//!   the foreground commands use.
//! - `messages.jsonl` receives every chat message.
//!
//! [`start`] launches `steam daemon run` detached, [`stop`] signals it, and
//! [`status`] reports what the files and the probe say. [`run_daemon`] is the
//! body of the detached process.

mod inbox;
pub mod process;
pub mod telemetry;

#[cfg(test)]
mod tests;

pub use inbox::MessageLogSink;
pub use process::{
    DaemonError, DaemonIntervals, DaemonLaunch, DaemonPlan, DaemonStatus, PidFileProbe,
    PresenceSchedule, ShutdownError, ShutdownListener, ShutdownSignal, Started,
    SystemShutdownSignal, process_alive, run_daemon, run_daemon_with, running_pid, start, status,
    stop,
};
