//! Notification dispatch loop.

use tracing::{debug, error};

use crate::callbacks::Notification;
use crate::client::CfgHandle;
use crate::errors::CfgError;
use crate::instance::Instance;
use crate::transport::{DispatchBuffer, PollTimeout};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// How many notifications one [`CfgHandle::dispatch`] call processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Wait for one notification, deliver it, and return.
    One,
    /// Deliver every queued notification without waiting, then return.
    All,
    /// Deliver notifications until the handle is finalized.
    Blocking,
}

impl DispatchMode {
    const fn timeout(self) -> PollTimeout {
        match self {
            Self::All => PollTimeout::Immediate,
            Self::One | Self::Blocking => PollTimeout::Infinite,
        }
    }
}

impl CfgHandle {
    /// Delivers pending notifications to the registered callbacks.
    ///
    /// Callbacks run on the calling thread with no library lock held. A
    /// finalize from any thread, a callback included, ends the loop
    /// successfully.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::BadHandle`] for unknown handles,
    /// [`CfgError::Library`] for a notification of unknown kind or with an
    /// inconsistent size, and transport errors from the poll.
    pub fn dispatch(self, mode: DispatchMode) -> Result<(), CfgError> {
        let instance = self.resolve()?;
        debug!(target: DISPATCH_TARGET, handle = %self, mode = ?mode, "dispatch started");
        run(self, &instance, mode)
    }
}

fn run(handle: CfgHandle, instance: &Instance, mode: DispatchMode) -> Result<(), CfgError> {
    let timeout = mode.timeout();
    loop {
        let (message, callbacks) = {
            let _dispatch = instance.lock_dispatch();
            if instance.is_closing() {
                return Ok(());
            }
            let polled = instance.transport().poll_next(timeout);
            if instance.is_closing() {
                return Ok(());
            }
            match polled? {
                Some(message) => (message, instance.callbacks()),
                None if mode == DispatchMode::All => return Ok(()),
                None => continue,
            }
        };

        let notification = match Notification::decode(message.as_bytes()) {
            Ok(notification) => notification,
            Err(failure) => {
                error!(
                    target: DISPATCH_TARGET,
                    handle = %handle,
                    delivered = message.len(),
                    error = %failure,
                    "rejected notification"
                );
                release(instance, message);
                return Err(failure);
            }
        };
        callbacks.deliver(handle, notification);
        release(instance, message);

        if mode == DispatchMode::One {
            return Ok(());
        }
    }
}

/// Returns a notification to the transport.
///
/// The dispatch lock keeps finalize from disconnecting mid-release. Once the
/// instance is finalized the buffer is simply dropped.
fn release(instance: &Instance, message: DispatchBuffer) {
    let _dispatch = instance.lock_dispatch();
    if instance.is_finalized() {
        drop(message);
    } else {
        instance.transport().release_message(message);
    }
}
