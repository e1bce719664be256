//! Multi-threaded properties of handles, calls, dispatch and finalize.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use corocfg_wire::{CFG_SERVICE, ShutdownNotification};
use rstest::{fixture, rstest};

use crate::transport::loopback::{CallEvent, LoopbackController};
use crate::{Callbacks, CfgError, CfgHandle, CsError, DispatchMode, ShutdownFlags, TransportError};

#[fixture]
fn controller() -> LoopbackController {
    LoopbackController::new()
}

fn initialize(controller: &LoopbackController, callbacks: Callbacks) -> CfgHandle {
    CfgHandle::initialize(&controller.connector(), callbacks).expect("initialize handle")
}

/// Polls `condition` until it holds or five seconds pass.
fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(2));
    }
}

#[rstest]
fn initialize_connects_to_the_configuration_service(controller: LoopbackController) {
    let handle = initialize(&controller, Callbacks::new());
    assert_eq!(controller.services(), vec![CFG_SERVICE]);
    handle.finalize().expect("finalize");
}

#[rstest]
fn refused_connections_surface_the_daemon_status(controller: LoopbackController) {
    controller.fail_connect(Some(CsError::Access));
    let error = CfgHandle::initialize(&controller.connector(), Callbacks::new())
        .expect_err("connection refused");

    assert!(matches!(
        error,
        CfgError::Transport(TransportError::Refused { .. })
    ));
    assert_eq!(error.code(), CsError::Access);
}

#[rstest]
fn handles_round_trip_through_their_raw_form(controller: LoopbackController) {
    let handle = initialize(&controller, Callbacks::new());
    assert_eq!(CfgHandle::from_raw(handle.as_raw()), handle);
    handle.finalize().expect("finalize");
}

#[rstest]
fn fd_get_reports_the_selection_descriptor_until_finalize(controller: LoopbackController) {
    controller.set_selection_fd(17);
    let handle = initialize(&controller, Callbacks::new());

    assert_eq!(handle.fd_get().expect("descriptor"), 17);
    handle.finalize().expect("finalize");
    assert!(matches!(handle.fd_get(), Err(CfgError::BadHandle)));
}

#[rstest]
fn calls_on_one_handle_never_interleave(controller: LoopbackController) {
    controller.set_reply_delay(Duration::from_millis(3));
    let handle = initialize(&controller, Callbacks::new());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(move || {
                for _ in 0..5 {
                    handle.local_get().expect("local node id");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }

    let events = controller.events();
    assert_eq!(events.len(), 40);
    assert!(
        events.chunks(2).all(|pair| matches!(
            pair,
            [CallEvent::Begin(begin), CallEvent::End(end)] if begin == end
        )),
        "exchanges interleaved: {events:?}"
    );
    handle.finalize().expect("finalize");
}

#[rstest]
fn finalize_ends_a_blocking_dispatch(controller: LoopbackController) {
    let handle = initialize(&controller, Callbacks::new());
    let dispatcher = thread::spawn(move || handle.dispatch(DispatchMode::Blocking));

    wait_until(|| controller.stats().polls > 0);
    handle.finalize().expect("finalize");

    let outcome = dispatcher.join().expect("dispatch thread");
    assert!(outcome.is_ok(), "dispatch failed: {outcome:?}");
    let stats = controller.stats();
    assert_eq!(stats.interrupts, 1);
    assert_eq!(stats.disconnects, 1);
    assert_eq!(stats.after_disconnect, 0);
}

#[rstest]
fn a_callback_may_finalize_its_own_handle(controller: LoopbackController) {
    let (sender, receiver) = mpsc::channel();
    let sender = Mutex::new(sender);
    let callbacks = Callbacks::new().on_shutdown(move |handle, flags| {
        let finalized = handle.finalize();
        sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send((flags, finalized.is_ok()))
            .expect("report from callback");
    });
    let handle = initialize(&controller, callbacks);
    controller.inject(ShutdownNotification::encode(ShutdownFlags::Immediate));
    controller.inject(ShutdownNotification::encode(ShutdownFlags::Immediate));

    let outcome = handle.dispatch(DispatchMode::Blocking);

    assert!(outcome.is_ok(), "dispatch failed: {outcome:?}");
    assert_eq!(
        receiver.try_recv().expect("callback ran"),
        (ShutdownFlags::Immediate, true)
    );
    assert!(receiver.try_recv().is_err(), "second notification delivered");
    assert_eq!(controller.pending_notifications(), 1);
    assert_eq!(controller.stats().after_disconnect, 0);
    assert!(matches!(handle.local_get(), Err(CfgError::BadHandle)));
}

#[rstest]
fn calls_racing_finalize_fail_cleanly(controller: LoopbackController) {
    controller.set_reply_delay(Duration::from_millis(1));
    let handle = initialize(&controller, Callbacks::new());
    let failures = Arc::new(Mutex::new(Vec::new()));
    let started = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let failures = Arc::clone(&failures);
            let started = Arc::clone(&started);
            thread::spawn(move || {
                loop {
                    started.store(true, Ordering::SeqCst);
                    if let Err(error) = handle.local_get() {
                        failures
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push(error.code());
                        break;
                    }
                }
            })
        })
        .collect();

    wait_until(|| started.load(Ordering::SeqCst) && controller.stats().sends > 2);
    handle.finalize().expect("finalize");
    for worker in workers {
        worker.join().expect("worker thread");
    }

    let codes = failures
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    assert_eq!(codes, vec![CsError::BadHandle; 3]);
    let stats = controller.stats();
    assert_eq!(stats.disconnects, 1);
    assert_eq!(stats.after_disconnect, 0);
}

#[rstest]
fn concurrent_finalizers_succeed_exactly_once(controller: LoopbackController) {
    let handle = initialize(&controller, Callbacks::new());
    let finalizers: Vec<_> = (0..4)
        .map(|_| thread::spawn(move || handle.finalize().is_ok()))
        .collect();
    let successes = finalizers
        .into_iter()
        .map(|finalizer| finalizer.join().expect("finalizer thread"))
        .filter(|succeeded| *succeeded)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(controller.stats().disconnects, 1);
}
