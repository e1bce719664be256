//! Command-line interface definition.

use clap::{Parser, Subcommand, ValueEnum};
use corocfg::{ShutdownFlags, ShutdownReply};

/// Reason recorded when `kill` is run without `--reason`.
pub(crate) const DEFAULT_KILL_REASON: &str = "Killed by corocfg-tool";

/// Addresses printed by `addrs` unless `--max` says otherwise.
pub(crate) const DEFAULT_MAX_ADDRESSES: usize = 16;

/// Administers the cluster configuration service.
#[derive(Parser, Debug)]
#[command(name = "corocfg-tool", version, disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Prints the local node id and the status of every ring.
    Status,
    /// Re-enables redundant rings after a fault.
    Reenable,
    /// Prints the local node id.
    Local,
    /// Prints the addresses of a node.
    Addrs {
        /// Node to query.
        nodeid: u32,
        /// Most addresses to print.
        #[arg(long, default_value_t = DEFAULT_MAX_ADDRESSES)]
        max: usize,
    },
    /// Kills a node.
    Kill {
        /// Node to kill.
        nodeid: u32,
        /// Reason recorded by the cluster.
        #[arg(long, default_value = DEFAULT_KILL_REASON)]
        reason: String,
    },
    /// Asks the cluster to shut down.
    Shutdown {
        /// How other clients are consulted.
        #[arg(long, value_enum, default_value_t = ShutdownMode::Request)]
        mode: ShutdownMode,
    },
    /// Loads a daemon service.
    Load {
        /// Service name.
        service: String,
        /// Service version.
        #[arg(long = "service-version", default_value_t = 0)]
        version: u32,
    },
    /// Unloads a daemon service.
    Unload {
        /// Service name.
        service: String,
        /// Service version.
        #[arg(long = "service-version", default_value_t = 0)]
        version: u32,
    },
    /// Waits for shutdown requests and answers each one.
    Watch {
        /// Answer given to every request.
        #[arg(long, value_enum, default_value_t = Answer::Yes)]
        answer: Answer,
        /// Stop after this many requests; watch forever when omitted.
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum ShutdownMode {
    /// Every client may veto.
    #[default]
    Request,
    /// Clients are asked but cannot veto.
    Regardless,
    /// Clients are not asked.
    Immediate,
}

impl From<ShutdownMode> for ShutdownFlags {
    fn from(mode: ShutdownMode) -> Self {
        match mode {
            ShutdownMode::Request => Self::Request,
            ShutdownMode::Regardless => Self::Regardless,
            ShutdownMode::Immediate => Self::Immediate,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum Answer {
    /// Agree to shut down.
    #[default]
    Yes,
    /// Veto the shutdown.
    No,
}

impl From<Answer> for ShutdownReply {
    fn from(answer: Answer) -> Self {
        match answer {
            Answer::Yes => Self::Yes,
            Answer::No => Self::No,
        }
    }
}
