//! Behavioural tests for service calls and notification dispatch.

use std::cell::RefCell;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use corocfg_wire::{
    AF_INET6, Ack, NodeAddrsReply, RequestHeader, RequestId, ResponseHeader, ResponseId,
    ShutdownNotification, TOTEMIP_ADDRLEN,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::transport::loopback::LoopbackController;
use crate::{
    Callbacks, CfgError, CfgHandle, CsError, DispatchMode, NodeAddresses, RetryPolicy,
    ShutdownFlags, ShutdownReply, retry_on_try_again,
};

struct ClientWorld {
    controller: LoopbackController,
    handle: Option<CfgHandle>,
    seen: Arc<Mutex<Vec<ShutdownFlags>>>,
    outcome: Option<Result<(), CfgError>>,
    node: Option<u32>,
    addresses: Option<NodeAddresses>,
}

impl ClientWorld {
    fn new() -> Self {
        Self {
            controller: LoopbackController::new(),
            handle: None,
            seen: Arc::new(Mutex::new(Vec::new())),
            outcome: None,
            node: None,
            addresses: None,
        }
    }

    fn initialize(&mut self, callbacks: Callbacks) {
        let handle = CfgHandle::initialize(&self.controller.connector(), callbacks)
            .expect("initialize handle");
        self.handle = Some(handle);
    }

    fn handle(&self) -> CfgHandle {
        self.handle.expect("handle should be initialized")
    }

    fn record<T>(&mut self, result: Result<T, CfgError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.outcome = Some(Ok(()));
                Some(value)
            }
            Err(error) => {
                self.outcome = Some(Err(error));
                None
            }
        }
    }

    fn failure(&self) -> &CfgError {
        match &self.outcome {
            Some(Err(error)) => error,
            Some(Ok(())) => panic!("expected the call to fail"),
            None => panic!("no call was made"),
        }
    }

    fn seen(&self) -> Vec<ShutdownFlags> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for ClientWorld {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Scenarios that already finalized get BadHandle here.
            drop(handle.finalize());
        }
    }
}

fn parse_policy(policy: &str) -> ShutdownFlags {
    match policy {
        "request" => ShutdownFlags::Request,
        "regardless" => ShutdownFlags::Regardless,
        "immediate" => ShutdownFlags::Immediate,
        other => panic!("unknown shutdown policy {other}"),
    }
}

fn parse_answer(answer: &str) -> ShutdownReply {
    match answer {
        "yes" => ShutdownReply::Yes,
        "no" => ShutdownReply::No,
        other => panic!("unknown shutdown answer {other}"),
    }
}

fn ipv6(last: u8) -> [u8; TOTEMIP_ADDRLEN] {
    [0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, last]
}

fn queue_shutdown_requests(world: &RefCell<ClientWorld>, count: usize, policy: &str) {
    let flags = parse_policy(policy);
    let controller = world.borrow().controller.clone();
    for _ in 0..count {
        controller.inject(ShutdownNotification::encode(flags));
    }
}

#[fixture]
fn world() -> RefCell<ClientWorld> {
    RefCell::new(ClientWorld::new())
}

#[given("a loopback daemon reporting node {nodeid}")]
fn given_daemon_node(world: &RefCell<ClientWorld>, nodeid: u32) {
    world.borrow().controller.set_local_nodeid(nodeid);
}

#[given("an initialized handle")]
fn given_handle(world: &RefCell<ClientWorld>) {
    world.borrow_mut().initialize(Callbacks::new());
}

#[given("an initialized handle answering shutdown requests with {answer}")]
fn given_answering_handle(world: &RefCell<ClientWorld>, answer: String) {
    let reply = parse_answer(&answer);
    let seen = Arc::clone(&world.borrow().seen);
    let callbacks = Callbacks::new().on_shutdown(move |handle, flags| {
        seen.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(flags);
        handle
            .replyto_shutdown(reply)
            .expect("answer shutdown request");
    });
    world.borrow_mut().initialize(callbacks);
}

#[given("the daemon refuses the next {count} sends")]
fn given_refusals(world: &RefCell<ClientWorld>, count: usize) {
    world.borrow().controller.refuse_next(count);
}

#[given("the daemon answers the next ring re-enable with a busy status")]
fn given_busy_reply(world: &RefCell<ClientWorld>) {
    let reply = ResponseHeader::failed(ResponseId::RingReenable, CsError::Busy).encode();
    world.borrow().controller.push_reply(reply);
}

#[given("the daemon reports {count} IPv6 addresses")]
fn given_addresses(world: &RefCell<ClientWorld>, count: u8) {
    let addresses: Vec<_> = (1..=count).map(ipv6).collect();
    let reply = NodeAddrsReply::encode(AF_INET6, &addresses);
    world.borrow().controller.push_reply(reply);
}

#[given("the daemon queues {count} shutdown request with policy {policy}")]
fn given_one_shutdown_request(world: &RefCell<ClientWorld>, count: usize, policy: String) {
    queue_shutdown_requests(world, count, &policy);
}

#[given("the daemon queues {count} shutdown requests with policy {policy}")]
fn given_shutdown_requests(world: &RefCell<ClientWorld>, count: usize, policy: String) {
    queue_shutdown_requests(world, count, &policy);
}

#[given("the daemon queues a notification of unknown kind")]
fn given_unknown_notification(world: &RefCell<ClientWorld>) {
    world
        .borrow()
        .controller
        .inject(Ack::encode(ResponseId::LocalGet));
}

#[when("the local node id is requested")]
fn when_local_get(world: &RefCell<ClientWorld>) {
    let result = world.borrow().handle().local_get();
    let mut state = world.borrow_mut();
    state.node = state.record(result);
}

#[when("node {nodeid} is killed with a reason of {length} bytes")]
fn when_kill_node(world: &RefCell<ClientWorld>, nodeid: u32, length: usize) {
    let reason = "r".repeat(length);
    let result = world.borrow().handle().kill_node(nodeid, &reason);
    world.borrow_mut().record(result);
}

#[when("the rings are re-enabled with retries")]
fn when_reenable_with_retries(world: &RefCell<ClientWorld>) {
    let handle = world.borrow().handle();
    let policy = RetryPolicy::new()
        .with_max_attempts(5)
        .with_base_delay(Duration::from_millis(1));
    let result = retry_on_try_again(&policy, || handle.ring_reenable());
    world.borrow_mut().record(result);
}

#[when("the rings are re-enabled")]
fn when_reenable(world: &RefCell<ClientWorld>) {
    let result = world.borrow().handle().ring_reenable();
    world.borrow_mut().record(result);
}

#[when("up to {max} addresses of node {nodeid} are requested")]
fn when_node_addresses(world: &RefCell<ClientWorld>, max: usize, nodeid: u32) {
    let result = world.borrow().handle().get_node_addrs(nodeid, max);
    let mut state = world.borrow_mut();
    state.addresses = state.record(result);
}

#[when("the handle is finalized")]
fn when_finalized(world: &RefCell<ClientWorld>) {
    let result = world.borrow().handle().finalize();
    world.borrow_mut().record(result);
}

#[when("the handle is finalized again")]
fn when_finalized_again(world: &RefCell<ClientWorld>) {
    let result = world.borrow().handle().finalize();
    world.borrow_mut().record(result);
}

#[when("all pending notifications are dispatched")]
fn when_dispatch_all(world: &RefCell<ClientWorld>) {
    let result = world.borrow().handle().dispatch(DispatchMode::All);
    world.borrow_mut().record(result);
}

#[when("one notification is dispatched")]
fn when_dispatch_one(world: &RefCell<ClientWorld>) {
    let result = world.borrow().handle().dispatch(DispatchMode::One);
    world.borrow_mut().record(result);
}

#[then("the call succeeds")]
fn then_succeeds(world: &RefCell<ClientWorld>) {
    let state = world.borrow();
    assert!(
        matches!(state.outcome, Some(Ok(()))),
        "expected success, got {:?}",
        state.outcome
    );
}

#[then("the call reports node {nodeid}")]
fn then_reports_node(world: &RefCell<ClientWorld>, nodeid: u32) {
    assert_eq!(world.borrow().node, Some(nodeid));
}

#[then("the call fails because the name is too long")]
fn then_name_too_long(world: &RefCell<ClientWorld>) {
    let state = world.borrow();
    assert!(matches!(
        state.failure(),
        CfgError::NameTooLong {
            length: 256,
            max: 256
        }
    ));
}

#[then("the call fails with the daemon status busy")]
fn then_daemon_busy(world: &RefCell<ClientWorld>) {
    let state = world.borrow();
    assert!(matches!(state.failure(), CfgError::Status(CsError::Busy)));
}

#[then("the call fails with a bad handle")]
fn then_bad_handle(world: &RefCell<ClientWorld>) {
    let state = world.borrow();
    assert!(matches!(state.failure(), CfgError::BadHandle));
}

#[then("the call fails with a library error")]
fn then_library_error(world: &RefCell<ClientWorld>) {
    let state = world.borrow();
    assert!(matches!(state.failure(), CfgError::Library(_)));
}

#[then("no request reached the daemon")]
fn then_no_request(world: &RefCell<ClientWorld>) {
    let state = world.borrow();
    assert!(state.controller.requests().is_empty());
    assert_eq!(state.controller.stats().send_attempts, 0);
}

#[then("exactly {count} request reached the daemon")]
fn then_requests(world: &RefCell<ClientWorld>, count: usize) {
    assert_eq!(world.borrow().controller.requests().len(), count);
}

#[then("{count} send attempts were made")]
fn then_send_attempts(world: &RefCell<ClientWorld>, count: usize) {
    let stats = world.borrow().controller.stats();
    assert_eq!(stats.send_attempts, count);
    assert_eq!(stats.sends, 1);
}

#[then("{reported} addresses are reported and {decoded} are decoded")]
fn then_addresses(world: &RefCell<ClientWorld>, reported: usize, decoded: usize) {
    let state = world.borrow();
    let addresses = state.addresses.as_ref().expect("addresses decoded");
    assert_eq!(addresses.reported, reported);
    assert_eq!(addresses.addresses.len(), decoded);
}

#[then("the transport was disconnected once")]
fn then_disconnected_once(world: &RefCell<ClientWorld>) {
    let stats = world.borrow().controller.stats();
    assert_eq!(stats.disconnects, 1);
    assert_eq!(stats.after_disconnect, 0);
}

#[then("no transport operation followed the disconnect")]
fn then_nothing_after_disconnect(world: &RefCell<ClientWorld>) {
    let stats = world.borrow().controller.stats();
    assert_eq!(stats.after_disconnect, 0);
    assert_eq!(stats.send_attempts, 0);
}

#[then("the callback saw policy {policy}")]
fn then_callback_policy(world: &RefCell<ClientWorld>, policy: String) {
    assert_eq!(world.borrow().seen(), vec![parse_policy(&policy)]);
}

#[then("{count} callbacks ran")]
fn then_callbacks_ran(world: &RefCell<ClientWorld>, count: usize) {
    assert_eq!(world.borrow().seen().len(), count);
}

#[then("the daemon received a shutdown reply")]
fn then_shutdown_reply_sent(world: &RefCell<ClientWorld>) {
    let requests = world.borrow().controller.requests();
    let last = requests.last().expect("a request was sent");
    let header = RequestHeader::decode(last).expect("request header");
    assert_eq!(header.id, RequestId::ReplyToShutdown);
}

#[then("{count} notifications remain queued")]
fn then_notifications_queued(world: &RefCell<ClientWorld>, count: usize) {
    assert_eq!(world.borrow().controller.pending_notifications(), count);
}

#[scenario(path = "tests/features/service_calls.feature")]
fn service_call_scenarios(#[from(world)] world: RefCell<ClientWorld>) {
    drop(world);
}

#[scenario(path = "tests/features/dispatch.feature")]
fn dispatch_scenarios(#[from(world)] world: RefCell<ClientWorld>) {
    drop(world);
}
