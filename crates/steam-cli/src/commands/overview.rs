//! `steam status`: the session and the daemon at a glance.

use std::io::Write;
use std::process::ExitCode;

use steam_state::SessionStore;

use super::CommandContext;
use super::auth::print_session;
use super::daemon::print_status;
use crate::AppError;
use crate::output::Output;

pub(super) fn show<W: Write, E: Write>(
    context: &CommandContext<'_>,
    output: &mut Output<'_, W, E>,
) -> Result<ExitCode, AppError> {
    let paths = context.readonly_paths()?;
    let session = SessionStore::new(paths.session_path()).load();
    print_session(&session, output)?;
    print_status(&steamd::status(&paths)?, output)?;

    let next = if session.authenticated {
        "steam msg <STEAM_ID> <MESSAGE>"
    } else if session.needs_code {
        "steam auth code <CODE>"
    } else {
        "steam auth login"
    };
    output.line(format_args!("next: {next}"))?;
    Ok(ExitCode::SUCCESS)
}
