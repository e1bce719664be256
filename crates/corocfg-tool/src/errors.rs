//! Failures reported by the tool.

use std::io;
use std::sync::Arc;

use corocfg::CfgError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to connect to the configuration service: {0}")]
    Connect(#[source] CfgError),
    #[error("{operation} failed: {source}")]
    Operation {
        operation: &'static str,
        #[source]
        source: CfgError,
    },
    #[error("failed to close the configuration handle: {0}")]
    Finalize(#[source] CfgError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl AppError {
    /// Wraps a library failure with the operation it interrupted.
    pub(crate) const fn operation(operation: &'static str, source: CfgError) -> Self {
        Self::Operation { operation, source }
    }
}
