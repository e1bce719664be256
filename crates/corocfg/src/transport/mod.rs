//! Transport abstraction between client instances and the daemon.
//!
//! A [`Transport`] owns one daemon connection: a request/response stream
//! used by synchronous calls and a dispatch stream carrying notifications.
//! All methods take `&self` so a transport can be shared by callers and a
//! dispatch thread. Serialisation of calls is the instance's job, not the
//! transport's.

#[cfg(any(test, feature = "test-support"))]
pub mod loopback;
#[cfg(unix)]
pub mod socket;

use corocfg_wire::ServiceId;

use crate::errors::TransportError;

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// How long [`Transport::poll_next`] may wait for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTimeout {
    /// Return at once when nothing is queued.
    Immediate,
    /// Wait until a notification arrives or the transport is interrupted.
    Infinite,
}

macro_rules! owned_buffer {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            bytes: Vec<u8>,
        }

        impl $name {
            /// Wraps delivered bytes.
            #[must_use]
            pub const fn new(bytes: Vec<u8>) -> Self {
                Self { bytes }
            }

            /// Delivered bytes.
            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                &self.bytes
            }

            /// Number of delivered bytes.
            #[must_use]
            pub fn len(&self) -> usize {
                self.bytes.len()
            }

            /// Whether nothing was delivered.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.bytes.is_empty()
            }
        }
    };
}

owned_buffer!(
    /// Reply whose size was chosen by the transport.
    ReplyBuffer
);
owned_buffer!(
    /// Notification taken off the dispatch stream.
    DispatchBuffer
);

/// One connection to the daemon.
pub trait Transport: Send + Sync {
    /// Descriptor that becomes readable when a notification is pending.
    fn selection_fd(&self) -> i32;

    /// Sends `request` and copies the reply into `reply`.
    ///
    /// Returns the number of bytes delivered.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::TryAgain`] when the request cannot be
    /// buffered right now, and other variants when the exchange fails.
    fn send_and_receive(&self, request: &[u8], reply: &mut [u8]) -> Result<usize, TransportError>;

    /// Sends `request` and returns a reply sized by the transport.
    ///
    /// # Errors
    ///
    /// As for [`Transport::send_and_receive`].
    fn send_and_receive_dynamic(&self, request: &[u8]) -> Result<ReplyBuffer, TransportError>;

    /// Hands a dynamic reply back once the caller has decoded it.
    fn release_reply(&self, reply: ReplyBuffer) {
        drop(reply);
    }

    /// Takes the next pending notification.
    ///
    /// Returns `Ok(None)` when nothing arrived within `timeout` or the
    /// transport was interrupted.
    ///
    /// # Errors
    ///
    /// Returns an error when the dispatch stream fails.
    fn poll_next(&self, timeout: PollTimeout) -> Result<Option<DispatchBuffer>, TransportError>;

    /// Hands a notification back once its callback has run.
    fn release_message(&self, message: DispatchBuffer) {
        drop(message);
    }

    /// Wakes any blocked [`Transport::poll_next`] and keeps later polls from
    /// blocking.
    fn interrupt(&self);

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error when the streams could not be shut down cleanly.
    fn disconnect(&self) -> Result<(), TransportError>;
}

/// Opens transports bound to a daemon service.
pub trait Connector {
    /// Connects to `service`.
    ///
    /// # Errors
    ///
    /// Returns an error when the daemon is unreachable or refuses the
    /// service.
    fn connect(&self, service: ServiceId) -> Result<Box<dyn Transport>, TransportError>;
}
