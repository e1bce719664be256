//! Client runtime for the cluster configuration service.
//!
//! A [`CfgHandle`] names one connection to the daemon. Handles are plain
//! copyable values backed by a process-wide registry, so any thread may use
//! any handle and a handle used after [`CfgHandle::finalize`] fails cleanly
//! with [`CfgError::BadHandle`].
//!
//! Each connection has two channels. Synchronous calls such as
//! [`CfgHandle::local_get`] send a request and wait for its reply; calls on
//! the same handle are serialised. Asynchronous notifications, currently
//! shutdown requests, queue on the second channel until the application
//! runs [`CfgHandle::dispatch`], which hands them to the [`Callbacks`] that
//! were registered at initialization.
//!
//! ```no_run
//! use corocfg::{Callbacks, CfgHandle, DispatchMode, ShutdownReply, SocketConnector};
//!
//! # fn main() -> Result<(), corocfg::CfgError> {
//! let callbacks = Callbacks::new().on_shutdown(|handle, _flags| {
//!     let _answered = handle.replyto_shutdown(ShutdownReply::Yes);
//! });
//! let handle = CfgHandle::initialize(&SocketConnector::default(), callbacks)?;
//! println!("local node {}", handle.local_get()?);
//! handle.dispatch(DispatchMode::All)?;
//! handle.finalize()?;
//! # Ok(())
//! # }
//! ```
//!
//! The daemon is reached through a [`Transport`]. [`SocketTransport`] speaks
//! to a running daemon; the `test-support` feature adds an in-memory
//! loopback transport for exercising applications without one.

mod call;
mod callbacks;
mod client;
mod decode;
mod dispatch;
mod errors;
mod instance;
mod registry;
mod retry;
mod service;
pub mod transport;

pub use callbacks::{Callbacks, Notification};
pub use client::CfgHandle;
pub use decode::{AddressFamily, NodeAddress, NodeAddresses, RingStatus};
pub use dispatch::DispatchMode;
pub use errors::{CfgError, TransportError};
pub use retry::{DEFAULT_MAX_DELAY, RetryPolicy, retry_on_try_again};
#[cfg(unix)]
pub use transport::socket::{SocketConnector, SocketTransport};
pub use transport::{Connector, DispatchBuffer, PollTimeout, ReplyBuffer, Transport};

pub use corocfg_wire::{CS_MAX_NAME_LENGTH, CsError, ShutdownFlags, ShutdownReply};

#[cfg(test)]
mod tests;
