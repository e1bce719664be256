//! Per-handle connection state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::callbacks::Callbacks;
use crate::client::CLIENT_TARGET;
use crate::transport::Transport;

/// State shared by every operation on one handle.
///
/// Lock order is dispatch before response. Synchronous calls take only the
/// response lock and dispatch takes only the dispatch lock, so finalize is
/// the sole holder of both.
pub(crate) struct Instance {
    transport: Box<dyn Transport>,
    callbacks: Arc<Callbacks>,
    dispatch_lock: Mutex<()>,
    response_lock: Mutex<()>,
    finalized: AtomicBool,
    closing: AtomicBool,
}

impl Instance {
    pub(crate) fn new(transport: Box<dyn Transport>, callbacks: Callbacks) -> Self {
        Self {
            transport,
            callbacks: Arc::new(callbacks),
            dispatch_lock: Mutex::new(()),
            response_lock: Mutex::new(()),
            finalized: AtomicBool::new(false),
            closing: AtomicBool::new(false),
        }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn callbacks(&self) -> Arc<Callbacks> {
        Arc::clone(&self.callbacks)
    }

    pub(crate) fn lock_dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn lock_response(&self) -> MutexGuard<'_, ()> {
        self.response_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Whether finalize has started or finished.
    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire) || self.is_finalized()
    }

    /// Announces a finalize; returns `true` for the first caller only.
    pub(crate) fn begin_closing(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }

    /// Must be called with both locks held.
    pub(crate) fn mark_finalized(&self) {
        self.finalized.store(true, Ordering::Release);
    }

    /// Registry destructor; runs once, after the last reference is gone.
    pub(crate) fn destroy(&self) {
        debug_assert!(self.is_finalized(), "destroying a live instance");
        debug!(target: CLIENT_TARGET, "instance destroyed");
    }
}
