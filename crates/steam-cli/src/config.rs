//! Separates configuration flags from command tokens.
//!
//! Configuration flags must precede the command. Everything from the first
//! token that is not a recognised flag onwards belongs to `clap`, so
//! `steam msg 1 --log-filter` sends the literal text rather than reconfiguring
//! logging.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use steam_config::Config;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from the flags returned by
    /// [`split_config_arguments`], program name included.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

/// Layered loading through `ortho_config`.
pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    let Some(body) = text.strip_prefix("--") else {
        return FlagAction::Stop;
    };
    let (name, inline_value) = match body.split_once('=') {
        Some((name, _)) => (name, true),
        None => (body, false),
    };
    if crate::CONFIG_CLI_FLAGS.contains(&name) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Arguments split at the first command token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by the configuration flags and their values.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by the command tokens.
    pub(crate) command_arguments: Vec<OsString>,
}

impl ConfigArgumentSplit {
    /// Configuration flags without the program name, for forwarding to a
    /// child process.
    pub(crate) fn forwarded_flags(&self) -> &[OsString] {
        self.config_arguments.get(1..).unwrap_or_default()
    }
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut tokens = args.iter();
    let Some(program) = tokens.next() else {
        return ConfigArgumentSplit {
            config_arguments: Vec::new(),
            command_arguments: Vec::new(),
        };
    };

    let mut config_arguments = vec![program.clone()];
    let mut command_arguments = vec![program.clone()];
    let mut awaiting_value = false;
    for argument in tokens.by_ref() {
        if awaiting_value {
            config_arguments.push(argument.clone());
            awaiting_value = false;
            continue;
        }
        match classify(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                awaiting_value = needs_value;
            }
            FlagAction::Stop => {
                command_arguments.push(argument.clone());
                break;
            }
        }
    }
    command_arguments.extend(tokens.cloned());

    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
