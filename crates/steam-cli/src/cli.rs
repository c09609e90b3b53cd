//! Command-line grammar for `steam`.

use clap::{Parser, Subcommand};
use steam_state::SteamId;

/// Messages shown by `steam inbox` when no limit is given.
pub(crate) const DEFAULT_INBOX_LIMIT: usize = 20;

/// Command-line interface for the Steam session tool.
#[derive(Parser, Debug)]
#[command(
    name = "steam",
    version,
    about = "Keeps a Steam session alive and sends messages from the shell",
    disable_help_subcommand = true,
    after_help = "Configuration flags (--state-dir, --log-filter, ...) must come before the command."
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Manages the stored login.
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Controls the background connection.
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Sends a chat message.
    Msg {
        /// Recipient's 64-bit Steam ID.
        #[arg(value_name = "STEAM_ID")]
        recipient: SteamId,
        /// Message text; words are joined with single spaces.
        #[arg(
            value_name = "MESSAGE",
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        message: Vec<String>,
    },
    /// Lists messages received by the daemon.
    Inbox {
        /// Number of most recent messages to show.
        #[arg(long, default_value_t = DEFAULT_INBOX_LIMIT)]
        limit: usize,
    },
    /// Summarises the session and the daemon.
    Status,
    /// Prints the version.
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum AuthAction {
    /// Logs in, prompting for anything not given.
    Login {
        /// Account name.
        username: Option<String>,
        /// Account password.
        password: Option<String>,
    },
    /// Submits a Steam Guard or two-factor code.
    Code {
        /// Code from the email or authenticator.
        code: String,
    },
    /// Disconnects and forgets the stored session.
    Logout,
    /// Shows the stored session and login throttling.
    Status,
    /// Forgets the login attempt history.
    ClearRateLimit,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DaemonAction {
    /// Launches the daemon in the background.
    Start,
    /// Asks the running daemon to exit.
    Stop,
    /// Reports whether the daemon is running.
    Status,
    /// Runs the daemon in the foreground.
    #[command(hide = true)]
    Run,
}
