//! `steam daemon ...`

use std::io::Write;
use std::process::ExitCode;

use steam_state::SessionStore;
use steamd::{DaemonError, DaemonLaunch, DaemonStatus};
use time::format_description::well_known::Rfc3339;

use super::CommandContext;
use crate::AppError;
use crate::cli::DaemonAction;
use crate::output::{Output, yes_no};

pub(super) fn handle<W: Write, E: Write>(
    action: DaemonAction,
    context: &CommandContext<'_>,
    output: &mut Output<'_, W, E>,
) -> Result<ExitCode, AppError> {
    match action {
        DaemonAction::Start => {
            let paths = context.paths()?;
            let session = SessionStore::new(paths.session_path()).load();
            if !session.authenticated {
                return Err(DaemonError::NotAuthenticated.into());
            }
            let launch = DaemonLaunch::current_exe(context.forwarded_flags())?;
            let started = steamd::start(&paths, &launch)?;
            output.line(format_args!(
                "daemon started (pid {}); logging to {}",
                started.pid,
                started.log_path.display()
            ))?;
        }
        DaemonAction::Stop => {
            let pid = steamd::stop(&context.readonly_paths()?)?;
            output.line(format_args!("sent stop request to daemon (pid {pid})"))?;
        }
        DaemonAction::Status => {
            let status = steamd::status(&context.readonly_paths()?)?;
            print_status(&status, output)?;
        }
        DaemonAction::Run => steamd::run_daemon(context.config())?,
    }
    Ok(ExitCode::SUCCESS)
}

pub(super) fn print_status<W: Write, E: Write>(
    status: &DaemonStatus,
    output: &mut Output<'_, W, E>,
) -> Result<(), AppError> {
    if !status.running {
        output.line(format_args!(
            "daemon is not running; use 'steam daemon start' to launch it"
        ))?;
        if status.is_stale() {
            let pid = status.pid.map_or_else(String::new, |pid| format!(" (pid {pid})"));
            output.line(format_args!(
                "stale files from a previous daemon{pid} remain; they are replaced on the next start"
            ))?;
        }
        return Ok(());
    }

    let pid = status.pid.unwrap_or_default();
    output.line(format_args!("daemon is running (pid {pid})"))?;
    let Some(snapshot) = &status.snapshot else {
        return Ok(());
    };
    if let Some(started) = snapshot.start_time {
        output.line(format_args!("  Started:   {}", started.format(&Rfc3339)?))?;
    }
    output.line(format_args!("  Connected: {}", yes_no(snapshot.connected)))?;
    if snapshot.steam_id.is_known() {
        output.line(format_args!("  Steam ID:  {}", snapshot.steam_id))?;
        output.line(format_args!("  Username:  {}", snapshot.username))?;
    }
    if let Some(updated) = snapshot.updated_at {
        output.line(format_args!("  Heartbeat: {}", updated.format(&Rfc3339)?))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use steam_state::{DaemonState, SteamId};
    use time::macros::datetime;

    fn render(status: &DaemonStatus) -> String {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        print_status(status, &mut Output::new(&mut stdout, &mut stderr)).expect("render");
        String::from_utf8(stdout).expect("utf8")
    }

    #[rstest]
    fn stale_files_are_called_out() {
        let text = render(&DaemonStatus {
            pid: Some(4242),
            running: false,
            snapshot: None,
        });
        assert!(text.starts_with("daemon is not running"));
        assert!(text.contains("stale files from a previous daemon (pid 4242)"));
    }

    #[rstest]
    fn running_daemon_shows_its_heartbeat() {
        let mut snapshot = DaemonState::launched(4242, datetime!(2025-06-01 09:00 UTC));
        snapshot.connected = true;
        snapshot.steam_id = SteamId::new(76_561_198_000_000_001);
        snapshot.username = String::from("alice");
        let text = render(&DaemonStatus {
            pid: Some(4242),
            running: true,
            snapshot: Some(snapshot),
        });
        assert!(text.contains("daemon is running (pid 4242)"));
        assert!(text.contains("Started:   2025-06-01T09:00:00Z"));
        assert!(text.contains("Connected: yes"));
        assert!(text.contains("Username:  alice"));
    }
}
