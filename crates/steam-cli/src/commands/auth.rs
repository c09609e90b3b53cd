//! `steam auth ...`

use std::io::Write;
use std::process::ExitCode;

use dialoguer::{Input, Password as PasswordPrompt};
use steam_session::{Decision, LoginReport, LoginStatus};
use steam_state::{Password, SessionState};

use super::CommandContext;
use crate::AppError;
use crate::cli::AuthAction;
use crate::output::{Output, yes_no};

pub(super) fn handle<W: Write, E: Write>(
    action: AuthAction,
    context: &CommandContext<'_>,
    output: &mut Output<'_, W, E>,
) -> Result<ExitCode, AppError> {
    let service = context.auth_service()?;
    match action {
        AuthAction::Login { username, password } => {
            let stored = service.status();
            if stored.connected && stored.authenticated {
                output.line(format_args!(
                    "already authenticated as {} ({})",
                    stored.username, stored.steam_id
                ))?;
                output.line(format_args!("use 'steam auth logout' to start fresh"))?;
                return Ok(ExitCode::SUCCESS);
            }
            let username = match username {
                Some(username) => username,
                None => prompt_username()?,
            };
            let password = match password {
                Some(password) => Password::new(password),
                None => prompt_password()?,
            };
            let report = service.login(&username, password)?;
            report_login(&report, output)?;
            Ok(ExitCode::SUCCESS)
        }
        AuthAction::Code { code } => {
            let report = service.submit_code(&code)?;
            report_login(&report, output)?;
            // A second prompt means the code itself was refused.
            Ok(match report.status {
                LoginStatus::CodeRequired { .. } => ExitCode::FAILURE,
                _ => ExitCode::SUCCESS,
            })
        }
        AuthAction::Logout => {
            service.logout()?;
            output.line(format_args!("logged out"))?;
            Ok(ExitCode::SUCCESS)
        }
        AuthAction::Status => {
            print_session(&service.status(), output)?;
            output.line(format_args!(
                "Rate limit:    {}",
                describe_decision(service.rate_limit_decision())
            ))?;
            Ok(ExitCode::SUCCESS)
        }
        AuthAction::ClearRateLimit => {
            service.clear_rate_limit()?;
            output.line(format_args!("login attempt history cleared"))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn prompt_username() -> Result<String, AppError> {
    Input::<String>::new()
        .with_prompt("Steam username")
        .interact_text()
        .map_err(|source| AppError::Prompt {
            field: "username",
            source,
        })
}

fn prompt_password() -> Result<Password, AppError> {
    PasswordPrompt::new()
        .with_prompt("Steam password")
        .interact()
        .map(Password::new)
        .map_err(|source| AppError::Prompt {
            field: "password",
            source,
        })
}

fn report_login<W: Write, E: Write>(
    report: &LoginReport,
    output: &mut Output<'_, W, E>,
) -> Result<(), AppError> {
    if let Some(failures) = report.prior_failures {
        output.warning(format_args!(
            "{failures} consecutive failed logins; another failure may start a cooldown"
        ))?;
    }
    match &report.status {
        LoginStatus::AlreadyAuthenticated { username, steam_id } => {
            output.line(format_args!("already authenticated as {username} ({steam_id})"))
        }
        LoginStatus::Authenticated { steam_id } => {
            output.line(format_args!("logged in as {steam_id}"))
        }
        LoginStatus::CodeRequired { message } => output.line(format_args!("{message}")),
    }
}

pub(super) fn print_session<W: Write, E: Write>(
    session: &SessionState,
    output: &mut Output<'_, W, E>,
) -> Result<(), AppError> {
    output.line(format_args!("Connected:     {}", yes_no(session.connected)))?;
    output.line(format_args!(
        "Authenticated: {}",
        yes_no(session.authenticated)
    ))?;
    output.line(format_args!("Needs code:    {}", yes_no(session.needs_code)))?;
    if session.steam_id.is_known() {
        output.line(format_args!("Steam ID:      {}", session.steam_id))?;
    }
    if !session.username.is_empty() {
        output.line(format_args!("Username:      {}", session.username))?;
    }
    if !session.last_error.is_empty() {
        output.line(format_args!("Last error:    {}", session.last_error))?;
    }
    Ok(())
}

pub(super) fn describe_decision(decision: Decision) -> String {
    match decision {
        Decision::Allow => String::from("clear"),
        Decision::Warn { consecutive_fails } => {
            format!("{consecutive_fails} consecutive failed logins")
        }
        Decision::Block(reason) => reason.to_string(),
    }
}
