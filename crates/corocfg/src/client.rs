//! Handle lifecycle: initialize, descriptor lookup and finalize.

use std::fmt;

use corocfg_wire::CFG_SERVICE;
use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::callbacks::Callbacks;
use crate::errors::CfgError;
use crate::instance::Instance;
use crate::registry::{Handle, HandleDatabase, InstanceRef};
use crate::transport::Connector;

pub(crate) const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

static REGISTRY: Lazy<HandleDatabase<Instance>> =
    Lazy::new(|| HandleDatabase::new(Box::new(Instance::destroy)));

/// Handle to one connection with the configuration service.
///
/// Handles are plain values: copy them freely and share them across
/// threads. Every operation resolves the handle afresh, so using a handle
/// after [`CfgHandle::finalize`] fails with [`CfgError::BadHandle`] rather
/// than touching a closed connection.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfgHandle(Handle);

impl CfgHandle {
    /// Connects to the configuration service and registers `callbacks`.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::Transport`] when the connection fails and
    /// [`CfgError::NoMemory`] when the handle table cannot grow.
    pub fn initialize(connector: &dyn Connector, callbacks: Callbacks) -> Result<Self, CfgError> {
        let transport = connector.connect(CFG_SERVICE)?;
        let created = REGISTRY
            .create(Instance::new(transport, callbacks))
            .map_err(|rejected| {
                if let Err(error) = rejected.value.transport().disconnect() {
                    warn!(
                        target: CLIENT_TARGET,
                        error = %error,
                        "failed to disconnect after handle creation failed"
                    );
                }
                rejected.error
            })?;
        let handle = Self(created.handle());
        debug!(target: CLIENT_TARGET, handle = %handle, "handle initialized");
        Ok(handle)
    }

    /// Rebuilds a handle from [`CfgHandle::as_raw`].
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(Handle::from_raw(raw))
    }

    /// Opaque numeric form of the handle.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0.as_raw()
    }

    pub(crate) fn resolve(self) -> Result<InstanceRef<'static, Instance>, CfgError> {
        REGISTRY.resolve(self.0)
    }

    /// Descriptor that becomes readable when notifications are pending.
    ///
    /// Integrate it into an event loop and call [`CfgHandle::dispatch`] with
    /// [`DispatchMode::All`](crate::DispatchMode::All) when it fires.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::BadHandle`] for unknown or finalizing handles.
    pub fn fd_get(self) -> Result<i32, CfgError> {
        let instance = self.resolve()?;
        if instance.is_closing() {
            return Err(CfgError::BadHandle);
        }
        Ok(instance.transport().selection_fd())
    }

    /// Disconnects and retires the handle.
    ///
    /// A dispatch loop blocked on the same handle is woken and returns
    /// successfully. Concurrent calls already in progress finish before the
    /// connection closes; later ones fail with [`CfgError::BadHandle`].
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::BadHandle`] when the handle is unknown or was
    /// already finalized.
    pub fn finalize(self) -> Result<(), CfgError> {
        let instance = self.resolve()?;
        if instance.begin_closing() {
            // Wake a dispatch loop parked in a poll so it yields the lock.
            instance.transport().interrupt();
        }

        let dispatch = instance.lock_dispatch();
        let response = instance.lock_response();
        if instance.is_finalized() {
            drop(response);
            drop(dispatch);
            return Err(CfgError::BadHandle);
        }
        instance.mark_finalized();
        debug!(target: CLIENT_TARGET, handle = %self, "finalizing handle");
        if let Err(error) = instance.transport().disconnect() {
            warn!(
                target: CLIENT_TARGET,
                handle = %self,
                error = %error,
                "transport disconnect failed"
            );
        }
        drop(response);
        drop(dispatch);

        REGISTRY.mark_destroyed(self.0)
    }
}

impl fmt::Debug for CfgHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CfgHandle").field(&format_args!("{}", self.0)).finish()
    }
}

impl fmt::Display for CfgHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
