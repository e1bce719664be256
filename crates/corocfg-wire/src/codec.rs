//! Little-endian, offset-addressed encoding helpers.
#![expect(
    clippy::little_endian_bytes,
    reason = "the daemon wire format is little-endian on every host"
)]

use thiserror::Error;

/// Errors raised while encoding or decoding wire records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// The buffer ended before a fixed-layout field.
    #[error("record truncated: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required by the layout.
        needed: usize,
        /// Bytes actually delivered.
        available: usize,
    },
    /// The header size is smaller than a header or larger than the delivery.
    #[error("invalid record size {declared}: {available} bytes delivered")]
    InvalidSize {
        /// Size declared in the header.
        declared: i32,
        /// Bytes actually delivered.
        available: usize,
    },
    /// The header identifier did not match the expected response.
    #[error("unexpected message id {found}, expected {expected}")]
    UnexpectedId {
        /// Identifier the caller waited for.
        expected: i32,
        /// Identifier found in the header.
        found: i32,
    },
    /// A name did not fit its fixed-width field.
    #[error("name of {length} bytes exceeds the {max} byte limit")]
    NameTooLong {
        /// Length of the rejected name in bytes.
        length: usize,
        /// Maximum length including the terminator.
        max: usize,
    },
    /// An enumerated field carried a value outside its catalogue.
    #[error("unknown {field} value {value}")]
    UnknownValue {
        /// Name of the offending field.
        field: &'static str,
        /// Raw value found on the wire.
        value: u32,
    },
}

/// Fixed-size output buffer written at explicit offsets.
pub(crate) struct Encoder {
    bytes: Vec<u8>,
}

impl Encoder {
    pub(crate) fn with_size(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    pub(crate) fn put_bytes(&mut self, offset: usize, value: &[u8]) {
        let end = offset.saturating_add(value.len());
        if let Some(slot) = self.bytes.get_mut(offset..end) {
            slot.copy_from_slice(value);
        }
    }

    pub(crate) fn put_u8(&mut self, offset: usize, value: u8) {
        self.put_bytes(offset, &[value]);
    }

    pub(crate) fn put_u16(&mut self, offset: usize, value: u16) {
        self.put_bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn put_u32(&mut self, offset: usize, value: u32) {
        self.put_bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn put_i32(&mut self, offset: usize, value: i32) {
        self.put_bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn put_u64(&mut self, offset: usize, value: u64) {
        self.put_bytes(offset, &value.to_le_bytes());
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Bounds-checked reader over delivered bytes.
#[derive(Clone, Copy)]
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub(crate) const fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], WireError> {
        let end = offset.saturating_add(len);
        self.bytes.get(offset..end).ok_or(WireError::Truncated {
            needed: end,
            available: self.bytes.len(),
        })
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], WireError> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    pub(crate) fn u32_at(&self, offset: usize) -> Result<u32, WireError> {
        self.array::<4>(offset).map(u32::from_le_bytes)
    }

    pub(crate) fn i32_at(&self, offset: usize) -> Result<i32, WireError> {
        self.array::<4>(offset).map(i32::from_le_bytes)
    }
}

/// Returns the bytes of a NUL-terminated field up to (excluding) the NUL.
pub(crate) fn until_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|byte| *byte == 0).unwrap_or(field.len());
    field.get(..end).unwrap_or(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reports_truncation_with_required_length() {
        let bytes = [1_u8, 0, 0];
        let reader = Reader::new(&bytes);
        assert_eq!(
            reader.u32_at(0),
            Err(WireError::Truncated {
                needed: 4,
                available: 3
            })
        );
    }

    #[test]
    fn encoder_ignores_writes_past_the_record() {
        let mut encoder = Encoder::with_size(4);
        encoder.put_u32(2, u32::MAX);
        assert_eq!(encoder.finish(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn until_nul_stops_at_terminator() {
        assert_eq!(until_nul(b"eth0\0junk"), b"eth0");
        assert_eq!(until_nul(b"full"), b"full");
    }
}
