//! Request and response records of the configuration service.
//!
//! Offsets are absolute from the start of the record and follow the daemon's
//! eight-byte field alignment.

use crate::codec::{Encoder, Reader, WireError, until_nul};
use crate::consts::{
    CS_MAX_NAME_LENGTH, INTERFACE_NAME_LEN, INTERFACE_STATUS_LEN, MAX_INTERFACES,
    TOTEMIP_ADDRLEN,
};
use crate::header::{REQUEST_HEADER_LEN, RESPONSE_HEADER_LEN, RequestHeader, ResponseHeader};
use crate::ids::{RequestId, ResponseId};

/// A request record that can be encoded for the daemon.
pub trait Request {
    /// Identifier written in the request header.
    const ID: RequestId;
    /// Encoded record size in bytes.
    const SIZE: usize;

    /// Encodes the complete record, header included.
    ///
    /// # Errors
    ///
    /// Fails when a variable input does not fit its fixed-width field.
    fn encode(&self) -> Result<Vec<u8>, WireError>;
}

/// A response record decoded from bytes delivered by a transport.
pub trait Response<'a>: Sized {
    /// Size of the buffer a fixed-size exchange provides for this reply.
    const SIZE: usize;

    /// Decodes the record.
    ///
    /// # Errors
    ///
    /// Fails when the delivery is shorter than the record layout or the
    /// header is inconsistent with it.
    fn decode(bytes: &'a [u8]) -> Result<Self, WireError>;
}

fn frame<R: Request>() -> Encoder {
    let mut encoder = Encoder::with_size(R::SIZE);
    RequestHeader {
        size: wire_size(R::SIZE),
        id: R::ID,
    }
    .write(&mut encoder);
    encoder
}

fn wire_size(size: usize) -> i32 {
    i32::try_from(size).unwrap_or(i32::MAX)
}

fn check_name(name: &str) -> Result<(), WireError> {
    if name.len() >= CS_MAX_NAME_LENGTH {
        return Err(WireError::NameTooLong {
            length: name.len(),
            max: CS_MAX_NAME_LENGTH,
        });
    }
    Ok(())
}

/// Restricts a reader to the size declared in the header.
fn declared<'a>(bytes: &'a [u8], header: &ResponseHeader) -> &'a [u8] {
    bytes.get(..header.declared_len()).unwrap_or(bytes)
}

macro_rules! header_only_request {
    ($(#[$meta:meta])* $name:ident, $id:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl Request for $name {
            const ID: RequestId = $id;
            const SIZE: usize = REQUEST_HEADER_LEN;

            fn encode(&self) -> Result<Vec<u8>, WireError> {
                Ok(frame::<Self>().finish())
            }
        }
    };
}

header_only_request!(
    /// Queries the status of every ring interface.
    RingStatusGet,
    RequestId::RingStatusGet
);
header_only_request!(
    /// Re-enables redundant rings after a fault.
    RingReenable,
    RequestId::RingReenable
);
header_only_request!(
    /// Stops configuration state tracking.
    StateTrackStop,
    RequestId::StateTrackStop
);
header_only_request!(
    /// Queries the local node id.
    LocalGet,
    RequestId::LocalGet
);

const SERVICE_NAME_OFFSET: usize = 16;
const SERVICE_VERSION_OFFSET: usize = 272;

fn encode_service<R: Request>(name: &str, version: u32) -> Result<Vec<u8>, WireError> {
    check_name(name)?;
    let mut encoder = frame::<R>();
    encoder.put_bytes(SERVICE_NAME_OFFSET, name.as_bytes());
    encoder.put_u32(SERVICE_VERSION_OFFSET, version);
    Ok(encoder.finish())
}

/// Loads a daemon service by name and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceLoad<'a> {
    /// Service name; must be shorter than [`CS_MAX_NAME_LENGTH`].
    pub name: &'a str,
    /// Service version.
    pub version: u32,
}

impl Request for ServiceLoad<'_> {
    const ID: RequestId = RequestId::ServiceLoad;
    const SIZE: usize = 280;

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode_service::<Self>(self.name, self.version)
    }
}

/// Unloads a daemon service by name and version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceUnload<'a> {
    /// Service name; must be shorter than [`CS_MAX_NAME_LENGTH`].
    pub name: &'a str,
    /// Service version.
    pub version: u32,
}

impl Request for ServiceUnload<'_> {
    const ID: RequestId = RequestId::ServiceUnload;
    const SIZE: usize = 280;

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        encode_service::<Self>(self.name, self.version)
    }
}

/// Starts configuration state tracking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateTrackStart {
    /// Opaque tracking flags.
    pub flags: u8,
}

impl Request for StateTrackStart {
    const ID: RequestId = RequestId::StateTrackStart;
    const SIZE: usize = 32;

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut encoder = frame::<Self>();
        encoder.put_u8(16, self.flags);
        // The notification buffer address is a client pointer the daemon
        // never dereferences.
        encoder.put_u64(24, 0);
        Ok(encoder.finish())
    }
}

/// Kills a cluster node, recording a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillNode<'a> {
    /// Target node id.
    pub nodeid: u32,
    /// Reason text; must be shorter than [`CS_MAX_NAME_LENGTH`].
    pub reason: &'a str,
}

impl Request for KillNode<'_> {
    const ID: RequestId = RequestId::KillNode;
    const SIZE: usize = 288;

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        check_name(self.reason)?;
        let mut encoder = frame::<Self>();
        encoder.put_u32(16, self.nodeid);
        // Name length counts the terminating NUL.
        let length = u16::try_from(self.reason.len().saturating_add(1)).unwrap_or(u16::MAX);
        encoder.put_u16(24, length);
        encoder.put_bytes(26, self.reason.as_bytes());
        Ok(encoder.finish())
    }
}

/// Policy attached to a shutdown request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ShutdownFlags {
    /// Ask every registered client; any refusal vetoes the shutdown.
    #[default]
    Request,
    /// Ask every client but shut down regardless of the answers.
    Regardless,
    /// Shut down without asking.
    Immediate,
}

impl ShutdownFlags {
    /// Numeric wire value.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Request => 0,
            Self::Regardless => 1,
            Self::Immediate => 2,
        }
    }

    /// Maps a wire value onto a policy.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownValue`] for values outside the catalogue.
    pub const fn from_code(code: u32) -> Result<Self, WireError> {
        match code {
            0 => Ok(Self::Request),
            1 => Ok(Self::Regardless),
            2 => Ok(Self::Immediate),
            value => Err(WireError::UnknownValue {
                field: "shutdown flags",
                value,
            }),
        }
    }
}

/// Answer to a shutdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownReply {
    /// Refuse the shutdown.
    No,
    /// Accept the shutdown.
    Yes,
}

impl ShutdownReply {
    /// Numeric wire value.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::No => 0,
            Self::Yes => 1,
        }
    }
}

/// Asks the cluster to shut down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TryShutdown {
    /// Shutdown policy.
    pub flags: ShutdownFlags,
}

impl Request for TryShutdown {
    const ID: RequestId = RequestId::TryShutdown;
    const SIZE: usize = 24;

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut encoder = frame::<Self>();
        encoder.put_u32(16, self.flags.code());
        Ok(encoder.finish())
    }
}

/// Answers a shutdown request delivered through dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyToShutdown {
    /// The answer.
    pub reply: ShutdownReply,
}

impl Request for ReplyToShutdown {
    const ID: RequestId = RequestId::ReplyToShutdown;
    const SIZE: usize = 24;

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut encoder = frame::<Self>();
        encoder.put_u32(16, self.reply.code());
        Ok(encoder.finish())
    }
}

/// Looks up the addresses of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetNodeAddrs {
    /// Node whose addresses are requested.
    pub nodeid: u32,
}

impl Request for GetNodeAddrs {
    const ID: RequestId = RequestId::GetNodeAddrs;
    const SIZE: usize = 24;

    fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut encoder = frame::<Self>();
        encoder.put_u32(16, self.nodeid);
        Ok(encoder.finish())
    }
}

/// Header-only reply carrying just a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Reply header.
    pub header: ResponseHeader,
}

impl Ack {
    /// Encodes a successful acknowledgement.
    #[must_use]
    pub fn encode(id: ResponseId) -> Vec<u8> {
        ResponseHeader::ok(id, wire_size(RESPONSE_HEADER_LEN)).encode()
    }
}

impl Response<'_> for Ack {
    const SIZE: usize = RESPONSE_HEADER_LEN;

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            header: ResponseHeader::decode(bytes)?,
        })
    }
}

/// Reply carrying the local node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalGetReply {
    /// Reply header.
    pub header: ResponseHeader,
    /// Id of the node the daemon runs on.
    pub local_nodeid: u32,
}

impl LocalGetReply {
    /// Encodes a successful reply.
    #[must_use]
    pub fn encode(local_nodeid: u32) -> Vec<u8> {
        let mut encoder = Encoder::with_size(Self::SIZE);
        ResponseHeader::ok(ResponseId::LocalGet, wire_size(Self::SIZE)).write(&mut encoder);
        encoder.put_u32(24, local_nodeid);
        encoder.finish()
    }
}

impl Response<'_> for LocalGetReply {
    const SIZE: usize = 32;

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let header = ResponseHeader::decode(bytes)?;
        let reader = Reader::new(declared(bytes, &header));
        Ok(Self {
            header,
            local_nodeid: reader.u32_at(24)?,
        })
    }
}

const RING_COUNT_OFFSET: usize = 24;
const RING_NAMES_OFFSET: usize = 32;
const RING_STATUS_OFFSET: usize = RING_NAMES_OFFSET + MAX_INTERFACES * INTERFACE_NAME_LEN;

/// Reply describing every ring interface, borrowed from the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStatusReply<'a> {
    /// Reply header.
    pub header: ResponseHeader,
    /// Number of interfaces the daemon reported.
    pub interface_count: u32,
    body: &'a [u8],
}

impl<'a> RingStatusReply<'a> {
    /// Name of interface `index`, without its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownValue`] when `index` is past the fixed
    /// interface table.
    pub fn interface_name(&self, index: usize) -> Result<&'a [u8], WireError> {
        self.slot(index, RING_NAMES_OFFSET, INTERFACE_NAME_LEN)
    }

    /// Status text of interface `index`, without its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownValue`] when `index` is past the fixed
    /// interface table.
    pub fn interface_status(&self, index: usize) -> Result<&'a [u8], WireError> {
        self.slot(index, RING_STATUS_OFFSET, INTERFACE_STATUS_LEN)
    }

    fn slot(&self, index: usize, base: usize, width: usize) -> Result<&'a [u8], WireError> {
        if index >= MAX_INTERFACES {
            return Err(WireError::UnknownValue {
                field: "interface index",
                value: u32::try_from(index).unwrap_or(u32::MAX),
            });
        }
        let offset = base.saturating_add(index.saturating_mul(width));
        Reader::new(self.body)
            .slice(offset, width)
            .map(until_nul)
    }

    /// Encodes a successful reply listing `(name, status)` pairs.
    ///
    /// # Errors
    ///
    /// Fails when more than [`MAX_INTERFACES`] entries are given or a text
    /// does not fit its slot.
    pub fn encode(entries: &[(&str, &str)]) -> Result<Vec<u8>, WireError> {
        if entries.len() > MAX_INTERFACES {
            return Err(WireError::UnknownValue {
                field: "interface count",
                value: u32::try_from(entries.len()).unwrap_or(u32::MAX),
            });
        }
        let mut encoder = Encoder::with_size(Self::SIZE);
        ResponseHeader::ok(ResponseId::RingStatusGet, wire_size(Self::SIZE)).write(&mut encoder);
        encoder.put_u32(
            RING_COUNT_OFFSET,
            u32::try_from(entries.len()).unwrap_or(u32::MAX),
        );
        for (index, (name, status)) in entries.iter().enumerate() {
            fits(name, INTERFACE_NAME_LEN)?;
            fits(status, INTERFACE_STATUS_LEN)?;
            encoder.put_bytes(RING_NAMES_OFFSET + index * INTERFACE_NAME_LEN, name.as_bytes());
            encoder.put_bytes(
                RING_STATUS_OFFSET + index * INTERFACE_STATUS_LEN,
                status.as_bytes(),
            );
        }
        Ok(encoder.finish())
    }
}

fn fits(text: &str, width: usize) -> Result<(), WireError> {
    if text.len() >= width {
        return Err(WireError::NameTooLong {
            length: text.len(),
            max: width,
        });
    }
    Ok(())
}

impl<'a> Response<'a> for RingStatusReply<'a> {
    const SIZE: usize = RING_STATUS_OFFSET + MAX_INTERFACES * INTERFACE_STATUS_LEN;

    fn decode(bytes: &'a [u8]) -> Result<Self, WireError> {
        let header = ResponseHeader::decode(bytes)?;
        let body = declared(bytes, &header);
        let reader = Reader::new(body);
        let interface_count = reader.u32_at(RING_COUNT_OFFSET)?;
        reader.slice(0, Self::SIZE)?;
        Ok(Self {
            header,
            interface_count,
            body,
        })
    }
}

const ADDRS_FAMILY_OFFSET: usize = 24;
const ADDRS_COUNT_OFFSET: usize = 28;
const ADDRS_OFFSET: usize = 32;

/// Variable-size reply listing a node's addresses, borrowed from the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAddrsReply<'a> {
    /// Reply header.
    pub header: ResponseHeader,
    /// Raw address family tag.
    pub family: u32,
    /// Number of addresses the daemon reported.
    pub num_addrs: u32,
    body: &'a [u8],
}

impl<'a> NodeAddrsReply<'a> {
    /// Raw 16-byte address slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] when the delivery does not contain
    /// the slot.
    pub fn address(&self, index: usize) -> Result<&'a [u8], WireError> {
        let offset = ADDRS_OFFSET.saturating_add(index.saturating_mul(TOTEMIP_ADDRLEN));
        Reader::new(self.body).slice(offset, TOTEMIP_ADDRLEN)
    }

    /// Number of whole address slots the delivery actually contains.
    #[must_use]
    pub fn delivered_slots(&self) -> usize {
        self.body
            .len()
            .saturating_sub(ADDRS_OFFSET)
            .checked_div(TOTEMIP_ADDRLEN)
            .unwrap_or(0)
    }

    /// Encodes a successful reply for `family` with the given slots.
    #[must_use]
    pub fn encode(family: u32, addresses: &[[u8; TOTEMIP_ADDRLEN]]) -> Vec<u8> {
        let size = ADDRS_OFFSET + addresses.len() * TOTEMIP_ADDRLEN;
        let mut encoder = Encoder::with_size(size);
        ResponseHeader::ok(ResponseId::GetNodeAddrs, wire_size(size)).write(&mut encoder);
        encoder.put_u32(ADDRS_FAMILY_OFFSET, family);
        encoder.put_u32(
            ADDRS_COUNT_OFFSET,
            u32::try_from(addresses.len()).unwrap_or(u32::MAX),
        );
        for (index, address) in addresses.iter().enumerate() {
            encoder.put_bytes(ADDRS_OFFSET + index * TOTEMIP_ADDRLEN, address);
        }
        encoder.finish()
    }
}

impl<'a> Response<'a> for NodeAddrsReply<'a> {
    const SIZE: usize = ADDRS_OFFSET;

    fn decode(bytes: &'a [u8]) -> Result<Self, WireError> {
        let header = ResponseHeader::decode(bytes)?;
        let body = declared(bytes, &header);
        let reader = Reader::new(body);
        Ok(Self {
            header,
            family: reader.u32_at(ADDRS_FAMILY_OFFSET)?,
            num_addrs: reader.u32_at(ADDRS_COUNT_OFFSET)?,
            body,
        })
    }
}

/// Asynchronous shutdown request delivered to registered clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownNotification {
    /// Notification header.
    pub header: ResponseHeader,
    /// Raw shutdown policy.
    pub flags: u32,
}

impl ShutdownNotification {
    /// Decoded shutdown policy.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::UnknownValue`] for an unknown policy value.
    pub const fn policy(&self) -> Result<ShutdownFlags, WireError> {
        ShutdownFlags::from_code(self.flags)
    }

    /// Encodes a notification carrying `flags`.
    #[must_use]
    pub fn encode(flags: ShutdownFlags) -> Vec<u8> {
        let mut encoder = Encoder::with_size(Self::SIZE);
        ResponseHeader::ok(ResponseId::TestShutdown, wire_size(Self::SIZE)).write(&mut encoder);
        encoder.put_u32(24, flags.code());
        encoder.finish()
    }
}

impl Response<'_> for ShutdownNotification {
    const SIZE: usize = 32;

    fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let header = ResponseHeader::decode(bytes)?;
        header.expect_id(ResponseId::TestShutdown)?;
        let reader = Reader::new(declared(bytes, &header));
        Ok(Self {
            header,
            flags: reader.u32_at(24)?,
        })
    }
}

#[cfg(test)]
mod tests;
