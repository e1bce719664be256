//! End-to-end runs of the tool against mocked clients.

use std::cell::RefCell;
use std::ffi::OsString;
use std::net::{IpAddr, Ipv4Addr};
use std::process::ExitCode;

use corocfg::{
    AddressFamily, CfgError, CsError, NodeAddress, NodeAddresses, RingStatus, ShutdownFlags,
    ShutdownReply,
};
use corocfg_config::Config;
use mockall::{Sequence, mock};
use rstest::rstest;

use crate::cli::DEFAULT_KILL_REASON;
use crate::client::{ClientFactory, ClusterClient};
use crate::config::ConfigLoader;
use crate::errors::AppError;
use crate::run_with;

mock! {
    Client {}
    impl ClusterClient for Client {
        fn local_node(&self) -> Result<u32, CfgError>;
        fn ring_status(&self) -> Result<Vec<RingStatus>, CfgError>;
        fn reenable_rings(&self) -> Result<(), CfgError>;
        fn node_addresses(&self, nodeid: u32, max: usize) -> Result<NodeAddresses, CfgError>;
        fn kill_node(&self, nodeid: u32, reason: &str) -> Result<(), CfgError>;
        fn shutdown(&self, flags: ShutdownFlags) -> Result<(), CfgError>;
        fn load_service(&self, name: &str, version: u32) -> Result<(), CfgError>;
        fn unload_service(&self, name: &str, version: u32) -> Result<(), CfgError>;
        fn next_shutdown_request(&self) -> Result<ShutdownFlags, CfgError>;
        fn answer_shutdown(&self, reply: ShutdownReply) -> Result<(), CfgError>;
        fn close(&self) -> Result<(), CfgError>;
    }
}

mock! {
    Factory {}
    impl ClientFactory for Factory {
        fn connect(&self, config: &Config) -> Result<Box<dyn ClusterClient>, CfgError>;
    }
}

/// Loader that records the configuration arguments it was given.
#[derive(Default)]
struct RecordingLoader {
    seen: RefCell<Vec<OsString>>,
}

impl ConfigLoader for RecordingLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        *self.seen.borrow_mut() = args.to_vec();
        Ok(Config::default())
    }
}

/// Client that expects to be closed once.
fn closing_client() -> MockClient {
    let mut client = MockClient::new();
    client.expect_close().once().returning(|| Ok(()));
    client
}

fn factory_for(client: MockClient) -> MockFactory {
    let mut factory = MockFactory::new();
    factory
        .expect_connect()
        .once()
        .return_once(move |_| Ok(Box::new(client) as Box<dyn ClusterClient>));
    factory
}

struct Outcome {
    exit: ExitCode,
    stdout: String,
    stderr: String,
}

fn run_tool(args: &[&str], loader: &RecordingLoader, factory: &MockFactory) -> Outcome {
    let argv = std::iter::once("corocfg-tool")
        .chain(args.iter().copied())
        .map(OsString::from);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = run_with(argv, &mut stdout, &mut stderr, loader, factory);
    Outcome {
        exit,
        stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
        stderr: String::from_utf8(stderr).expect("utf-8 stderr"),
    }
}

#[test]
fn status_prints_every_ring() {
    let mut client = closing_client();
    client.expect_local_node().once().returning(|| Ok(2));
    client.expect_ring_status().once().returning(|| {
        Ok(vec![
            RingStatus {
                interface_name: "10.0.0.2".to_owned(),
                status: "ring 0 active with no faults".to_owned(),
            },
            RingStatus {
                interface_name: "10.1.0.2".to_owned(),
                status: "ring 1 active with no faults".to_owned(),
            },
        ])
    });

    let outcome = run_tool(&["status"], &RecordingLoader::default(), &factory_for(client));

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert_eq!(
        outcome.stdout,
        concat!(
            "Printing ring status.\n",
            "Local node ID 2\n",
            "RING ID 0\n",
            "\tid\t= 10.0.0.2\n",
            "\tstatus\t= ring 0 active with no faults\n",
            "RING ID 1\n",
            "\tid\t= 10.1.0.2\n",
            "\tstatus\t= ring 1 active with no faults\n",
        )
    );
}

#[test]
fn kill_sends_the_default_reason() {
    let mut client = closing_client();
    client
        .expect_kill_node()
        .withf(|nodeid, reason| *nodeid == 3 && reason == DEFAULT_KILL_REASON)
        .once()
        .returning(|_, _| Ok(()));

    let outcome = run_tool(&["kill", "3"], &RecordingLoader::default(), &factory_for(client));

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert_eq!(outcome.stdout, "Killed node 3.\n");
}

#[rstest]
#[case(&["shutdown"], ShutdownFlags::Request)]
#[case(&["shutdown", "--mode", "immediate"], ShutdownFlags::Immediate)]
fn shutdown_forwards_the_policy(#[case] args: &[&str], #[case] flags: ShutdownFlags) {
    let mut client = closing_client();
    client
        .expect_shutdown()
        .withf(move |requested| *requested == flags)
        .once()
        .returning(|_| Ok(()));

    let outcome = run_tool(args, &RecordingLoader::default(), &factory_for(client));

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
}

#[test]
fn addresses_report_what_was_not_shown() {
    let mut client = closing_client();
    client
        .expect_node_addresses()
        .withf(|nodeid, max| *nodeid == 5 && *max == 1)
        .once()
        .returning(|_, _| {
            Ok(NodeAddresses {
                reported: 3,
                addresses: vec![NodeAddress {
                    family: AddressFamily::Ipv4,
                    address: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))),
                }],
            })
        });

    let outcome = run_tool(
        &["addrs", "5", "--max", "1"],
        &RecordingLoader::default(),
        &factory_for(client),
    );

    assert_eq!(
        outcome.stdout,
        "Node 5 addresses:\n\t10.0.0.5\n\t(2 more not shown)\n"
    );
}

#[test]
fn watch_answers_each_request() {
    let mut client = closing_client();
    let mut sequence = Sequence::new();
    for flags in [ShutdownFlags::Request, ShutdownFlags::Regardless] {
        client
            .expect_next_shutdown_request()
            .once()
            .in_sequence(&mut sequence)
            .returning(move || Ok(flags));
        client
            .expect_answer_shutdown()
            .withf(|reply| *reply == ShutdownReply::No)
            .once()
            .in_sequence(&mut sequence)
            .returning(|_| Ok(()));
    }

    let outcome = run_tool(
        &["watch", "--answer", "no", "--count", "2"],
        &RecordingLoader::default(),
        &factory_for(client),
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert_eq!(
        outcome.stdout,
        concat!(
            "Shutdown requested (request); answered no.\n",
            "Shutdown requested (regardless); answered no.\n",
        )
    );
}

#[test]
fn failed_operations_still_close_the_handle() {
    let mut client = closing_client();
    client
        .expect_load_service()
        .once()
        .returning(|_, _| Err(CfgError::Status(CsError::NotExist)));

    let outcome = run_tool(
        &["load", "missing"],
        &RecordingLoader::default(),
        &factory_for(client),
    );

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.contains("service load failed"),
        "unexpected stderr: {}",
        outcome.stderr
    );
}

#[test]
fn connection_failures_are_reported() {
    let mut factory = MockFactory::new();
    factory
        .expect_connect()
        .once()
        .returning(|_| Err(CfgError::TryAgain));

    let outcome = run_tool(&["local"], &RecordingLoader::default(), &factory);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("failed to connect"));
}

#[test]
fn usage_errors_never_connect() {
    let mut factory = MockFactory::new();
    factory.expect_connect().never();

    let outcome = run_tool(&["kill"], &RecordingLoader::default(), &factory);

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stderr.starts_with("corocfg-tool: "));
}

#[test]
fn help_goes_to_stdout() {
    let mut factory = MockFactory::new();
    factory.expect_connect().never();

    let outcome = run_tool(&["--help"], &RecordingLoader::default(), &factory);

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert!(outcome.stdout.contains("Usage"));
}

#[test]
fn leading_configuration_flags_reach_the_loader() {
    let mut client = closing_client();
    client.expect_local_node().once().returning(|| Ok(1));
    let loader = RecordingLoader::default();

    let outcome = run_tool(
        &["--retry-attempts", "9", "--log-filter=debug", "local"],
        &loader,
        &factory_for(client),
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert_eq!(outcome.stdout, "Local node ID 1\n");
    assert_eq!(
        loader.seen.into_inner(),
        ["corocfg-tool", "--retry-attempts", "9", "--log-filter=debug"]
            .map(OsString::from)
            .to_vec()
    );
}
