//! Application callbacks and the notifications that trigger them.

use std::fmt;
use std::sync::Arc;

use corocfg_wire::{Response, ResponseHeader, ResponseId, ShutdownFlags, ShutdownNotification};

use crate::client::CfgHandle;
use crate::errors::CfgError;

type ShutdownCallback = dyn Fn(CfgHandle, ShutdownFlags) + Send + Sync;

/// Callbacks registered when a handle is initialized.
///
/// Callbacks run on the thread calling [`CfgHandle::dispatch`], without any
/// library lock held, so they may call back into the library with the same
/// handle, finalize included.
#[derive(Clone, Default)]
pub struct Callbacks {
    shutdown: Option<Arc<ShutdownCallback>>,
}

impl Callbacks {
    /// No callbacks registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for shutdown requests.
    ///
    /// The handler should answer with [`CfgHandle::replyto_shutdown`].
    #[must_use]
    pub fn on_shutdown<F>(mut self, callback: F) -> Self
    where
        F: Fn(CfgHandle, ShutdownFlags) + Send + Sync + 'static,
    {
        self.shutdown = Some(Arc::new(callback));
        self
    }

    pub(crate) fn deliver(&self, handle: CfgHandle, notification: Notification) {
        match notification {
            Notification::ShutdownRequest { flags } => {
                if let Some(callback) = &self.shutdown {
                    callback(handle, flags);
                }
            }
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("shutdown", &self.shutdown.is_some())
            .finish()
    }
}

/// Notification delivered through the dispatch stream.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The cluster asks whether this client agrees to shut down.
    ShutdownRequest {
        /// Policy the shutdown was requested with.
        flags: ShutdownFlags,
    },
}

impl Notification {
    /// Decodes a delivered notification.
    ///
    /// The declared size must fit within the delivered bytes.
    pub(crate) fn decode(bytes: &[u8]) -> Result<Self, CfgError> {
        let header = ResponseHeader::decode(bytes)?;
        match header.response_id() {
            Some(ResponseId::TestShutdown) => {
                let notification = ShutdownNotification::decode(bytes)?;
                Ok(Self::ShutdownRequest {
                    flags: notification.policy()?,
                })
            }
            _ => Err(CfgError::Library(format!(
                "unknown notification kind {}",
                header.id
            ))),
        }
    }
}
