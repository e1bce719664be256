//! Error types surfaced by the client library.

use std::io;

use corocfg_wire::{CsError, WireError};
use thiserror::Error;

/// Failures raised by a [`Transport`](crate::Transport) or a
/// [`Connector`](crate::Connector).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The daemon endpoint could not be reached.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint that was dialled.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The daemon refused the setup handshake for a stream.
    #[error("daemon refused the {channel} stream: {status}")]
    Refused {
        /// Stream role being set up.
        channel: &'static str,
        /// Status the daemon answered with.
        status: CsError,
    },
    /// Reading or writing a stream failed.
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
    /// The transport cannot buffer the message right now.
    #[error("transport is congested")]
    TryAgain,
    /// A message exceeded the negotiated size limit.
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Size of the offending message.
        size: usize,
        /// Negotiated limit.
        limit: usize,
    },
    /// A frame could not be parsed.
    #[error("malformed frame: {0}")]
    Malformed(#[from] WireError),
    /// The daemon closed the stream or the transport was disconnected.
    #[error("connection closed")]
    Closed,
}

impl TransportError {
    /// Status code this failure maps to.
    #[must_use]
    pub const fn code(&self) -> CsError {
        match self {
            Self::Refused { status, .. } => *status,
            Self::TryAgain => CsError::TryAgain,
            Self::TooLarge { .. } => CsError::TooBig,
            Self::Malformed(_) => CsError::MessageError,
            Self::Connect { .. } | Self::Io(_) | Self::Closed => CsError::Library,
        }
    }
}

/// Errors returned by every client operation.
#[derive(Debug, Error)]
pub enum CfgError {
    /// The handle is unknown, destroyed, or its instance is finalized.
    #[error("bad handle")]
    BadHandle,
    /// An allocation failed.
    #[error("out of memory")]
    NoMemory,
    /// A caller-supplied name does not fit its fixed-width field.
    #[error("name of {length} bytes exceeds the {max} byte limit")]
    NameTooLong {
        /// Length of the rejected name.
        length: usize,
        /// Field width, terminator included.
        max: usize,
    },
    /// The reply or notification violated the protocol.
    #[error("library error: {0}")]
    Library(String),
    /// The transport refused the request because its buffers are full.
    #[error("transport is congested; try again")]
    TryAgain,
    /// The daemon answered with a failure status.
    #[error("daemon reported: {0}")]
    Status(#[from] CsError),
    /// The transport failed.
    #[error(transparent)]
    Transport(TransportError),
}

impl CfgError {
    /// Status code this error maps to.
    #[must_use]
    pub const fn code(&self) -> CsError {
        match self {
            Self::BadHandle => CsError::BadHandle,
            Self::NoMemory => CsError::NoMemory,
            Self::NameTooLong { .. } => CsError::NameTooLong,
            Self::Library(_) => CsError::Library,
            Self::TryAgain => CsError::TryAgain,
            Self::Status(status) => *status,
            Self::Transport(error) => error.code(),
        }
    }

    /// Whether repeating the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<TransportError> for CfgError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::TryAgain => Self::TryAgain,
            other => Self::Transport(other),
        }
    }
}

impl From<WireError> for CfgError {
    fn from(error: WireError) -> Self {
        match error {
            WireError::NameTooLong { length, max } => Self::NameTooLong { length, max },
            other => Self::Library(other.to_string()),
        }
    }
}
