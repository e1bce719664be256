//! Decoding of replies that enumerate a cluster-dependent set of items.
//!
//! Outputs are built element by element through an [`Allocator`]. When any
//! allocation fails, everything built so far is dropped and the caller gets
//! [`CfgError::NoMemory`]; a partial list never escapes.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use corocfg_wire::{AF_INET, AF_INET6, MAX_INTERFACES, NodeAddrsReply, RingStatusReply};

use crate::errors::CfgError;

/// Fallible allocation of decoded outputs.
pub(crate) trait Allocator {
    /// Owned text produced for a name or status field.
    type Text;

    /// Empty list with room for `len` elements.
    fn list<E>(&mut self, len: usize) -> Result<Vec<E>, CfgError>;

    /// Owned copy of a NUL-trimmed text field.
    fn text(&mut self, bytes: &[u8]) -> Result<Self::Text, CfgError>;
}

/// Allocator backed by the global heap, reporting exhaustion as
/// [`CfgError::NoMemory`] instead of aborting.
pub(crate) struct SystemAllocator;

impl Allocator for SystemAllocator {
    type Text = String;

    fn list<E>(&mut self, len: usize) -> Result<Vec<E>, CfgError> {
        let mut list = Vec::new();
        list.try_reserve_exact(len).map_err(|_| CfgError::NoMemory)?;
        Ok(list)
    }

    fn text(&mut self, bytes: &[u8]) -> Result<String, CfgError> {
        let decoded = String::from_utf8_lossy(bytes);
        let mut text = String::new();
        text.try_reserve_exact(decoded.len())
            .map_err(|_| CfgError::NoMemory)?;
        text.push_str(&decoded);
        Ok(text)
    }
}

/// Status of one ring interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingStatus {
    /// Interface name as reported by the daemon.
    pub interface_name: String,
    /// Human-readable ring status.
    pub status: String,
}

/// Address family of a node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4, four-byte payload.
    Ipv4,
    /// IPv6, sixteen-byte payload.
    Ipv6,
    /// A family tag this library does not understand.
    Unknown(u32),
}

impl AddressFamily {
    /// Maps a raw family tag.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            AF_INET => Self::Ipv4,
            AF_INET6 => Self::Ipv6,
            other => Self::Unknown(other),
        }
    }

    /// Payload length, for known families only.
    #[must_use]
    pub const fn address_length(self) -> Option<usize> {
        match self {
            Self::Ipv4 => Some(4),
            Self::Ipv6 => Some(16),
            Self::Unknown(_) => None,
        }
    }
}

/// One address of a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    /// Family the daemon tagged the address with.
    pub family: AddressFamily,
    /// Decoded address; `None` when the family is unknown.
    pub address: Option<IpAddr>,
}

impl NodeAddress {
    fn decode(family: AddressFamily, slot: &[u8]) -> Self {
        let address = match family {
            AddressFamily::Ipv4 => slot
                .first_chunk::<4>()
                .map(|octets| IpAddr::V4(Ipv4Addr::from(*octets))),
            AddressFamily::Ipv6 => slot
                .first_chunk::<16>()
                .map(|octets| IpAddr::V6(Ipv6Addr::from(*octets))),
            AddressFamily::Unknown(_) => None,
        };
        Self { family, address }
    }

    /// Payload length of the address, if its family is known.
    #[must_use]
    pub const fn address_length(&self) -> Option<usize> {
        self.family.address_length()
    }
}

/// Addresses of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAddresses {
    /// Number of addresses the daemon reported.
    pub reported: usize,
    /// Decoded addresses, at most the requested maximum.
    pub addresses: Vec<NodeAddress>,
}

/// Builds one output per reported interface with `build`.
pub(crate) fn ring_entries<A, E>(
    reply: &RingStatusReply<'_>,
    allocator: &mut A,
    mut build: impl FnMut(A::Text, A::Text) -> E,
) -> Result<Vec<E>, CfgError>
where
    A: Allocator,
{
    let count = usize::try_from(reply.interface_count).unwrap_or(usize::MAX);
    if count > MAX_INTERFACES {
        return Err(CfgError::Library(format!(
            "daemon reported {count} interfaces; at most {MAX_INTERFACES} fit a reply"
        )));
    }
    let mut entries = allocator.list(count)?;
    for index in 0..count {
        let name = allocator.text(reply.interface_name(index)?)?;
        let status = allocator.text(reply.interface_status(index)?)?;
        entries.push(build(name, status));
    }
    Ok(entries)
}

pub(crate) fn ring_status(reply: &RingStatusReply<'_>) -> Result<Vec<RingStatus>, CfgError> {
    ring_entries(reply, &mut SystemAllocator, |interface_name, status| {
        RingStatus {
            interface_name,
            status,
        }
    })
}

pub(crate) fn node_addresses_with<A: Allocator>(
    reply: &NodeAddrsReply<'_>,
    max_addrs: usize,
    allocator: &mut A,
) -> Result<NodeAddresses, CfgError> {
    let reported = usize::try_from(reply.num_addrs).unwrap_or(usize::MAX);
    let family = AddressFamily::from_raw(reply.family);
    let wanted = reported.min(max_addrs);
    let delivered = reply.delivered_slots();
    if wanted > delivered {
        return Err(CfgError::Library(format!(
            "daemon reported {reported} addresses but delivered {delivered}"
        )));
    }
    let mut addresses = allocator.list(wanted)?;
    for index in 0..wanted {
        addresses.push(NodeAddress::decode(family, reply.address(index)?));
    }
    Ok(NodeAddresses {
        reported,
        addresses,
    })
}

pub(crate) fn node_addresses(
    reply: &NodeAddrsReply<'_>,
    max_addrs: usize,
) -> Result<NodeAddresses, CfgError> {
    node_addresses_with(reply, max_addrs, &mut SystemAllocator)
}
