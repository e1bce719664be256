//! Channel setup handshake exchanged when a stream is opened.

use crate::codec::{Encoder, Reader, WireError};
use crate::ids::ServiceId;
use crate::status::{CsError, status_from_code};

/// Encoded length of a [`SetupRequest`].
pub const SETUP_REQUEST_LEN: usize = 16;

/// Encoded length of a [`SetupResponse`].
pub const SETUP_RESPONSE_LEN: usize = 8;

/// Role of a stream within one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Carries requests and their replies.
    Response,
    /// Carries asynchronous notifications.
    Dispatch,
}

impl Channel {
    const fn code(self) -> u32 {
        match self {
            Self::Response => 0,
            Self::Dispatch => 1,
        }
    }
}

/// First record written on every stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupRequest {
    /// Service the stream binds to.
    pub service: ServiceId,
    /// Role of the stream.
    pub channel: Channel,
    /// Largest message the client accepts on this stream.
    pub max_message_size: u32,
}

impl SetupRequest {
    /// Encodes the 16-byte setup record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::with_size(SETUP_REQUEST_LEN);
        encoder.put_u32(0, self.service.0);
        encoder.put_u32(4, self.channel.code());
        encoder.put_u32(8, self.max_message_size);
        encoder.finish()
    }
}

/// Daemon answer to a [`SetupRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupResponse {
    /// Raw status code.
    pub error: u32,
}

impl SetupResponse {
    /// Decodes the 8-byte answer.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] for short input.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            error: Reader::new(bytes).u32_at(0)?,
        })
    }

    /// Interprets the status.
    ///
    /// # Errors
    ///
    /// Returns the daemon status when the setup was refused.
    pub const fn status(&self) -> Result<(), CsError> {
        status_from_code(self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CFG_SERVICE;

    #[test]
    fn setup_request_layout() {
        let bytes = SetupRequest {
            service: CFG_SERVICE,
            channel: Channel::Dispatch,
            max_message_size: 4096,
        }
        .encode();
        assert_eq!(
            bytes,
            vec![7, 0, 0, 0, 1, 0, 0, 0, 0, 16, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn refused_setup_reports_status() {
        let response = SetupResponse::decode(&[9, 0, 0, 0, 0, 0, 0, 0]).expect("decode");
        assert_eq!(response.status(), Err(CsError::BadHandle));
    }
}
