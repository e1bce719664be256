//! Wire catalogue for the cluster configuration service.
//!
//! The daemon speaks a fixed binary layout: little-endian integers, every
//! top-level field aligned to eight bytes, and a header carrying the record
//! size and a numeric message identifier (plus an embedded status on
//! responses). This crate owns that catalogue and nothing else; it performs
//! no I/O and knows nothing about handles or transports.
//!
//! Requests implement [`Request`] and encode into owned byte vectors.
//! Responses implement [`Response`] and decode from the bytes a transport
//! delivered, borrowing them where the reply carries a variable payload.

mod codec;
mod consts;
mod header;
mod ids;
mod records;
mod setup;
mod status;

pub use codec::WireError;
pub use consts::{
    AF_INET, AF_INET6, CS_MAX_NAME_LENGTH, DEFAULT_IPC_NAME, INTERFACE_NAME_LEN,
    INTERFACE_STATUS_LEN, MAX_INTERFACES, TOTEMIP_ADDRLEN,
};
pub use header::{
    REQUEST_HEADER_LEN, RESPONSE_HEADER_LEN, RequestHeader, ResponseHeader, declared_size,
};
pub use ids::{CFG_SERVICE, RequestId, ResponseId, ServiceId};
pub use records::{
    Ack, GetNodeAddrs, KillNode, LocalGet, LocalGetReply, NodeAddrsReply, ReplyToShutdown,
    Request, Response, RingReenable, RingStatusGet, RingStatusReply, ServiceLoad, ServiceUnload,
    ShutdownFlags, ShutdownNotification, ShutdownReply, StateTrackStart, StateTrackStop,
    TryShutdown,
};
pub use setup::{Channel, SETUP_REQUEST_LEN, SETUP_RESPONSE_LEN, SetupRequest, SetupResponse};
pub use status::{CS_OK, CsError, status_from_code};
