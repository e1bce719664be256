//! Command execution and output rendering.

use std::io::Write;

use corocfg::{NodeAddress, ShutdownFlags, ShutdownReply};
use tracing::info;

use crate::cli::Command;
use crate::client::ClusterClient;
use crate::errors::AppError;

const COMMAND_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::commands");

/// Runs `command` against an open client, writing results to `stdout`.
pub(crate) fn execute<W: Write>(
    command: &Command,
    client: &dyn ClusterClient,
    stdout: &mut W,
) -> Result<(), AppError> {
    match command {
        Command::Status => status(client, stdout),
        Command::Reenable => {
            client
                .reenable_rings()
                .map_err(|source| AppError::operation("ring re-enable", source))?;
            writeln!(stdout, "Re-enabling all failed rings.")?;
            Ok(())
        }
        Command::Local => {
            let nodeid = local_node(client)?;
            writeln!(stdout, "Local node ID {nodeid}")?;
            Ok(())
        }
        Command::Addrs { nodeid, max } => addresses(client, *nodeid, *max, stdout),
        Command::Kill { nodeid, reason } => {
            client
                .kill_node(*nodeid, reason)
                .map_err(|source| AppError::operation("kill node", source))?;
            writeln!(stdout, "Killed node {nodeid}.")?;
            Ok(())
        }
        Command::Shutdown { mode } => {
            let flags = ShutdownFlags::from(*mode);
            client
                .shutdown(flags)
                .map_err(|source| AppError::operation("shutdown", source))?;
            writeln!(stdout, "Cluster shutdown requested ({}).", policy_name(flags))?;
            Ok(())
        }
        Command::Load { service, version } => {
            client
                .load_service(service, *version)
                .map_err(|source| AppError::operation("service load", source))?;
            writeln!(stdout, "Loaded service {service} version {version}.")?;
            Ok(())
        }
        Command::Unload { service, version } => {
            client
                .unload_service(service, *version)
                .map_err(|source| AppError::operation("service unload", source))?;
            writeln!(stdout, "Unloaded service {service} version {version}.")?;
            Ok(())
        }
        Command::Watch { answer, count } => {
            watch(client, ShutdownReply::from(*answer), *count, stdout)
        }
    }
}

fn local_node(client: &dyn ClusterClient) -> Result<u32, AppError> {
    client
        .local_node()
        .map_err(|source| AppError::operation("local node query", source))
}

fn status<W: Write>(client: &dyn ClusterClient, stdout: &mut W) -> Result<(), AppError> {
    let nodeid = local_node(client)?;
    let rings = client
        .ring_status()
        .map_err(|source| AppError::operation("ring status query", source))?;
    writeln!(stdout, "Printing ring status.")?;
    writeln!(stdout, "Local node ID {nodeid}")?;
    for (ring, entry) in rings.iter().enumerate() {
        writeln!(stdout, "RING ID {ring}")?;
        writeln!(stdout, "\tid\t= {}", entry.interface_name)?;
        writeln!(stdout, "\tstatus\t= {}", entry.status)?;
    }
    Ok(())
}

fn addresses<W: Write>(
    client: &dyn ClusterClient,
    nodeid: u32,
    max: usize,
    stdout: &mut W,
) -> Result<(), AppError> {
    let listing = client
        .node_addresses(nodeid, max)
        .map_err(|source| AppError::operation("node address query", source))?;
    writeln!(stdout, "Node {nodeid} addresses:")?;
    for address in &listing.addresses {
        writeln!(stdout, "\t{}", render_address(address))?;
    }
    let hidden = listing.reported.saturating_sub(listing.addresses.len());
    if hidden > 0 {
        writeln!(stdout, "\t({hidden} more not shown)")?;
    }
    Ok(())
}

fn render_address(address: &NodeAddress) -> String {
    match address.address {
        Some(ip) => ip.to_string(),
        None => format!("unknown address family {:?}", address.family),
    }
}

const fn policy_name(flags: ShutdownFlags) -> &'static str {
    match flags {
        ShutdownFlags::Request => "request",
        ShutdownFlags::Regardless => "regardless",
        ShutdownFlags::Immediate => "immediate",
    }
}

const fn answer_name(reply: ShutdownReply) -> &'static str {
    match reply {
        ShutdownReply::Yes => "yes",
        ShutdownReply::No => "no",
    }
}

fn watch<W: Write>(
    client: &dyn ClusterClient,
    reply: ShutdownReply,
    count: Option<usize>,
    stdout: &mut W,
) -> Result<(), AppError> {
    let mut answered = 0_usize;
    while count.is_none_or(|limit| answered < limit) {
        let flags = client
            .next_shutdown_request()
            .map_err(|source| AppError::operation("dispatch", source))?;
        info!(target: COMMAND_TARGET, policy = policy_name(flags), "shutdown requested");
        client
            .answer_shutdown(reply)
            .map_err(|source| AppError::operation("shutdown reply", source))?;
        writeln!(
            stdout,
            "Shutdown requested ({}); answered {}.",
            policy_name(flags),
            answer_name(reply)
        )?;
        stdout.flush()?;
        answered += 1;
    }
    Ok(())
}
