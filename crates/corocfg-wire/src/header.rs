//! Request and response headers.

use crate::codec::{Encoder, Reader, WireError};
use crate::ids::{RequestId, ResponseId};
use crate::status::{CS_OK, CsError, status_from_code};

/// Encoded length of a request header.
pub const REQUEST_HEADER_LEN: usize = 16;

/// Encoded length of a response header.
pub const RESPONSE_HEADER_LEN: usize = 24;

const RESPONSE_HEADER_SIZE: i32 = 24;

const SIZE_OFFSET: usize = 0;
const ID_OFFSET: usize = 8;
const ERROR_OFFSET: usize = 16;

/// Header prefixed to every request record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Total record size in bytes, header included.
    pub size: i32,
    /// Request identifier.
    pub id: RequestId,
}

impl RequestHeader {
    pub(crate) fn write(self, encoder: &mut Encoder) {
        encoder.put_i32(SIZE_OFFSET, self.size);
        encoder.put_i32(ID_OFFSET, self.id.code());
    }

    /// Decodes a request header, as a daemon would on receipt.
    ///
    /// # Errors
    ///
    /// Fails when the bytes are shorter than a header, the size is out of
    /// range, or the identifier is unknown.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let reader = Reader::new(bytes);
        let size = reader.i32_at(SIZE_OFFSET)?;
        let raw_id = reader.i32_at(ID_OFFSET)?;
        check_size(size, REQUEST_HEADER_LEN, reader.len())?;
        let id = RequestId::from_code(raw_id).ok_or(WireError::UnknownValue {
            field: "request id",
            value: raw_id.unsigned_abs(),
        })?;
        Ok(Self { size, id })
    }
}

/// Header prefixed to every response and notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Total record size in bytes, header included.
    pub size: i32,
    /// Raw response identifier.
    pub id: i32,
    /// Raw status code embedded by the daemon.
    pub error: u32,
}

impl ResponseHeader {
    /// Builds a header for a successful record of `size` bytes.
    #[must_use]
    pub const fn ok(id: ResponseId, size: i32) -> Self {
        Self {
            size,
            id: id.code(),
            error: CS_OK,
        }
    }

    /// Builds a header-only failure record.
    #[must_use]
    pub const fn failed(id: ResponseId, status: CsError) -> Self {
        Self {
            size: RESPONSE_HEADER_SIZE,
            id: id.code(),
            error: status.code(),
        }
    }

    /// Decodes a response header from delivered bytes.
    ///
    /// The declared size must cover at least the header and must not exceed
    /// the number of bytes actually delivered.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] for short input and
    /// [`WireError::InvalidSize`] for an out-of-range size.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let reader = Reader::new(bytes);
        let size = reader.i32_at(SIZE_OFFSET)?;
        let id = reader.i32_at(ID_OFFSET)?;
        let error = reader.u32_at(ERROR_OFFSET)?;
        check_size(size, RESPONSE_HEADER_LEN, reader.len())?;
        Ok(Self { size, id, error })
    }

    /// Encodes the header into its 24-byte wire form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::with_size(RESPONSE_HEADER_LEN);
        self.write(&mut encoder);
        encoder.finish()
    }

    pub(crate) fn write(&self, encoder: &mut Encoder) {
        encoder.put_i32(SIZE_OFFSET, self.size);
        encoder.put_i32(ID_OFFSET, self.id);
        encoder.put_u32(ERROR_OFFSET, self.error);
    }

    /// Returns the known response identifier, if any.
    #[must_use]
    pub const fn response_id(&self) -> Option<ResponseId> {
        ResponseId::from_code(self.id)
    }

    /// Checks that the header carries the expected identifier.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnexpectedId`] on mismatch.
    pub const fn expect_id(&self, expected: ResponseId) -> Result<(), WireError> {
        if self.id == expected.code() {
            Ok(())
        } else {
            Err(WireError::UnexpectedId {
                expected: expected.code(),
                found: self.id,
            })
        }
    }

    /// Interprets the embedded status.
    ///
    /// # Errors
    ///
    /// Returns the daemon status when it is not success.
    pub const fn status(&self) -> Result<(), CsError> {
        status_from_code(self.error)
    }

    /// Declared record size as an unsigned length.
    #[must_use]
    pub const fn declared_len(&self) -> usize {
        self.size.unsigned_abs() as usize
    }
}

/// Reads the size a record declares in its first four bytes.
///
/// Stream transports use this to frame a record before the rest of it has
/// arrived. The size must cover at least a response header.
///
/// # Errors
///
/// Returns [`WireError::Truncated`] when fewer than four bytes are given and
/// [`WireError::InvalidSize`] for negative or undersized values.
pub fn declared_size(prefix: &[u8]) -> Result<usize, WireError> {
    let declared = Reader::new(prefix).i32_at(SIZE_OFFSET)?;
    usize::try_from(declared)
        .ok()
        .filter(|size| *size >= RESPONSE_HEADER_LEN)
        .ok_or(WireError::InvalidSize {
            declared,
            available: prefix.len(),
        })
}

fn check_size(declared: i32, minimum: usize, available: usize) -> Result<(), WireError> {
    let valid = usize::try_from(declared)
        .is_ok_and(|size| size >= minimum && size <= available);
    if valid {
        Ok(())
    } else {
        Err(WireError::InvalidSize {
            declared,
            available,
        })
    }
}
