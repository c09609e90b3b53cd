//! `steam msg` and `steam inbox`.

use std::io::Write;
use std::process::ExitCode;

use steam_session::Route;
use steam_state::{MessageLog, SteamId};
use time::format_description::well_known::Rfc3339;

use super::CommandContext;
use crate::AppError;
use crate::output::Output;

pub(super) fn send<W: Write, E: Write>(
    recipient: SteamId,
    text: &str,
    context: &CommandContext<'_>,
    output: &mut Output<'_, W, E>,
) -> Result<ExitCode, AppError> {
    let service = context.auth_service()?;
    let connection = service.send_message(recipient, text)?;
    let via = match connection.route() {
        Route::Reused => "the open connection",
        Route::Daemon => "a session beside the daemon",
        Route::Reauthenticated => "a fresh login",
    };
    output.line(format_args!("message sent to {recipient} via {via}"))?;
    Ok(ExitCode::SUCCESS)
}

pub(super) fn inbox<W: Write, E: Write>(
    limit: usize,
    context: &CommandContext<'_>,
    output: &mut Output<'_, W, E>,
) -> Result<ExitCode, AppError> {
    let log = MessageLog::new(context.readonly_paths()?.message_log_path());
    let messages = log.tail(limit)?;
    if messages.is_empty() {
        output.line(format_args!(
            "no messages received yet; the daemon records them while it runs"
        ))?;
    }
    for message in messages {
        output.line(format_args!(
            "{} {}: {}",
            message.received_at.format(&Rfc3339)?,
            message.sender,
            message.message
        ))?;
    }
    Ok(ExitCode::SUCCESS)
}
