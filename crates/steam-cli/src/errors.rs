//! Errors surfaced by the CLI runtime.

use std::io;
use std::sync::Arc;

use steam_config::StatePathsError;
use steam_session::AuthError;
use steam_state::StoreError;
use steamd::DaemonError;
use steamd::telemetry::TelemetryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    StatePaths(#[from] StatePathsError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Daemon(#[from] DaemonError),
    #[error("failed to read {field}: {source}")]
    Prompt {
        field: &'static str,
        #[source]
        source: dialoguer::Error,
    },
    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("failed to write output: {0}")]
    Output(io::Error),
}
