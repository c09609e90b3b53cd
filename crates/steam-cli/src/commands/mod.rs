//! Command handlers.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use steam_config::{Config, StatePaths};
use steam_session::{
    AuthService, BridgeFactory, ClientFactory, ConnectionManager, RateLimitGovernor,
    SessionTimeouts,
};
use steam_state::{MessageLog, RateLimitStore, SessionStore};
use steamd::{MessageLogSink, PidFileProbe};

use crate::AppError;
use crate::cli::CliCommand;
use crate::output::Output;

mod auth;
mod daemon;
mod message;
mod overview;

/// Everything a handler needs besides its own arguments.
pub(crate) struct CommandContext<'a> {
    config: &'a Config,
    forwarded_flags: &'a [OsString],
    factory: Option<Arc<dyn ClientFactory>>,
}

impl<'a> CommandContext<'a> {
    pub(crate) const fn new(
        config: &'a Config,
        forwarded_flags: &'a [OsString],
        factory: Option<Arc<dyn ClientFactory>>,
    ) -> Self {
        Self {
            config,
            forwarded_flags,
            factory,
        }
    }

    pub(crate) const fn config(&self) -> &Config {
        self.config
    }

    /// Configuration flags the CLI was invoked with, minus the program name.
    pub(crate) const fn forwarded_flags(&self) -> &[OsString] {
        self.forwarded_flags
    }

    /// Paths for commands that write state; the directory is created.
    pub(crate) fn paths(&self) -> Result<StatePaths, AppError> {
        Ok(StatePaths::from_config(self.config)?)
    }

    /// Paths for commands that only read state.
    pub(crate) fn readonly_paths(&self) -> Result<StatePaths, AppError> {
        Ok(StatePaths::from_config_readonly(self.config)?)
    }

    /// Builds the foreground login service over the state directory.
    ///
    /// Messages that arrive while the foreground connection is open are
    /// appended to the same log the daemon writes.
    pub(crate) fn auth_service(&self) -> Result<SessionScope, AppError> {
        let paths = self.paths()?;
        let factory = self.factory.clone().unwrap_or_else(|| {
            Arc::new(BridgeFactory::new(self.config.bridge_argv())) as Arc<dyn ClientFactory>
        });
        let manager = ConnectionManager::new(
            factory,
            SessionStore::new(paths.session_path()),
            RateLimitGovernor::new(RateLimitStore::new(paths.rate_limit_path())),
            Arc::new(PidFileProbe::new(paths.pid_path())),
        )
        .with_timeouts(SessionTimeouts {
            connect: self.config.connect_timeout(),
            login: self.config.login_timeout(),
        })
        .with_sink(Arc::new(MessageLogSink::new(MessageLog::new(
            paths.message_log_path(),
        ))));
        Ok(SessionScope {
            service: AuthService::new(manager),
        })
    }
}

/// An [`AuthService`] whose connection is closed when the command ends.
pub(crate) struct SessionScope {
    service: AuthService,
}

impl std::ops::Deref for SessionScope {
    type Target = AuthService;

    fn deref(&self) -> &Self::Target {
        &self.service
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        self.service.manager().dispose();
    }
}

pub(crate) fn dispatch<W: Write, E: Write>(
    command: CliCommand,
    context: &CommandContext<'_>,
    output: &mut Output<'_, W, E>,
) -> Result<ExitCode, AppError> {
    match command {
        CliCommand::Auth { action } => auth::handle(action, context, output),
        CliCommand::Daemon { action } => daemon::handle(action, context, output),
        CliCommand::Msg {
            recipient,
            message: words,
        } => message::send(recipient, &words.join(" "), context, output),
        CliCommand::Inbox { limit } => message::inbox(limit, context, output),
        CliCommand::Status => overview::show(context, output),
        CliCommand::Version => {
            output.line(format_args!("steam-cli v{}", env!("CARGO_PKG_VERSION")))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
