//! Operator tool for the cluster configuration service.
//!
//! [`run`] splits leading configuration flags off for the layered loader,
//! parses the command, installs telemetry, opens a handle, runs the command
//! and finalizes the handle. Output and diagnostics go to the writers the
//! caller provides.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

mod cli;
mod client;
mod commands;
mod config;
mod errors;
pub mod telemetry;

use cli::Cli;
use client::{ClientFactory, SocketClientFactory};
use config::{ConfigLoader, OrthoConfigLoader, command_arguments, split_config_arguments};
use errors::AppError;

/// Runs the tool with the given arguments and output streams.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with(args, stdout, stderr, &OrthoConfigLoader, &SocketClientFactory)
}

pub(crate) fn run_with<I, W, E>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &dyn ConfigLoader,
    factory: &dyn ClientFactory,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let cli = match Cli::try_parse_from(command_arguments(&args, &split)) {
        Ok(cli) => cli,
        Err(error) if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return match write!(stdout, "{error}") {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            };
        }
        Err(error) => return report(stderr, &AppError::CliUsage(error)),
    };

    let outcome = loader
        .load(&split.config_arguments)
        .and_then(|config| {
            telemetry::initialise(&config)?;
            Ok(config)
        })
        .and_then(|config| {
            let client = factory.connect(&config).map_err(AppError::Connect)?;
            let executed = commands::execute(&cli.command, client.as_ref(), stdout);
            let closed = client.close().map_err(AppError::Finalize);
            executed.and(closed)
        });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report(stderr, &error),
    }
}

fn report<E: Write>(stderr: &mut E, error: &AppError) -> ExitCode {
    // Nothing further can be reported if stderr itself fails.
    drop(writeln!(stderr, "corocfg-tool: {error}"));
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests;
