//! Message and service identifiers.

use std::fmt;

/// Identifier of a daemon service a connection is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(pub u32);

impl fmt::Display for ServiceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "service {}", self.0)
    }
}

/// The cluster configuration service.
pub const CFG_SERVICE: ServiceId = ServiceId(7);

/// Identifiers carried in request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestId {
    /// Query ring interface status.
    RingStatusGet,
    /// Re-enable faulty redundant rings.
    RingReenable,
    /// Start configuration state tracking.
    StateTrackStart,
    /// Stop configuration state tracking.
    StateTrackStop,
    /// Set administrative state.
    AdminStateSet,
    /// Query administrative state.
    AdminStateGet,
    /// Load a daemon service.
    ServiceLoad,
    /// Unload a daemon service.
    ServiceUnload,
    /// Kill a cluster node.
    KillNode,
    /// Request cluster shutdown.
    TryShutdown,
    /// Answer a shutdown request.
    ReplyToShutdown,
    /// Look up the addresses of a node.
    GetNodeAddrs,
    /// Query the local node id.
    LocalGet,
}

impl RequestId {
    /// Returns the numeric identifier written in the header.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::RingStatusGet => 0,
            Self::RingReenable => 1,
            Self::StateTrackStart => 2,
            Self::StateTrackStop => 3,
            Self::AdminStateSet => 4,
            Self::AdminStateGet => 5,
            Self::ServiceLoad => 6,
            Self::ServiceUnload => 7,
            Self::KillNode => 8,
            Self::TryShutdown => 9,
            Self::ReplyToShutdown => 10,
            Self::GetNodeAddrs => 11,
            Self::LocalGet => 12,
        }
    }

    /// Maps a numeric identifier back onto a request.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::RingStatusGet,
            1 => Self::RingReenable,
            2 => Self::StateTrackStart,
            3 => Self::StateTrackStop,
            4 => Self::AdminStateSet,
            5 => Self::AdminStateGet,
            6 => Self::ServiceLoad,
            7 => Self::ServiceUnload,
            8 => Self::KillNode,
            9 => Self::TryShutdown,
            10 => Self::ReplyToShutdown,
            11 => Self::GetNodeAddrs,
            12 => Self::LocalGet,
            _ => return None,
        })
    }

    /// Returns the identifier the daemon uses for the matching reply.
    #[must_use]
    pub const fn response(self) -> ResponseId {
        match self {
            Self::RingStatusGet => ResponseId::RingStatusGet,
            Self::RingReenable => ResponseId::RingReenable,
            Self::StateTrackStart => ResponseId::StateTrackStart,
            Self::StateTrackStop => ResponseId::StateTrackStop,
            Self::AdminStateSet => ResponseId::AdminStateSet,
            Self::AdminStateGet => ResponseId::AdminStateGet,
            Self::ServiceLoad => ResponseId::ServiceLoad,
            Self::ServiceUnload => ResponseId::ServiceUnload,
            Self::KillNode => ResponseId::KillNode,
            Self::TryShutdown => ResponseId::TryShutdown,
            Self::ReplyToShutdown => ResponseId::ReplyToShutdown,
            Self::GetNodeAddrs => ResponseId::GetNodeAddrs,
            Self::LocalGet => ResponseId::LocalGet,
        }
    }
}

/// Identifiers carried in response and notification headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseId {
    /// Reply to [`RequestId::RingStatusGet`].
    RingStatusGet,
    /// Reply to [`RequestId::RingReenable`].
    RingReenable,
    /// Reply to [`RequestId::StateTrackStart`].
    StateTrackStart,
    /// Reply to [`RequestId::StateTrackStop`].
    StateTrackStop,
    /// Reply to [`RequestId::AdminStateSet`].
    AdminStateSet,
    /// Reply to [`RequestId::AdminStateGet`].
    AdminStateGet,
    /// Reply to [`RequestId::ServiceLoad`].
    ServiceLoad,
    /// Reply to [`RequestId::ServiceUnload`].
    ServiceUnload,
    /// Reply to [`RequestId::KillNode`].
    KillNode,
    /// Reply to [`RequestId::TryShutdown`].
    TryShutdown,
    /// Asynchronous shutdown request delivered through dispatch.
    TestShutdown,
    /// Reply to [`RequestId::GetNodeAddrs`].
    GetNodeAddrs,
    /// Reply to [`RequestId::LocalGet`].
    LocalGet,
    /// Reply to [`RequestId::ReplyToShutdown`].
    ReplyToShutdown,
}

impl ResponseId {
    /// Returns the numeric identifier written in the header.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::RingStatusGet => 0,
            Self::RingReenable => 1,
            Self::StateTrackStart => 2,
            Self::StateTrackStop => 3,
            Self::AdminStateSet => 4,
            Self::AdminStateGet => 5,
            Self::ServiceLoad => 6,
            Self::ServiceUnload => 7,
            Self::KillNode => 8,
            Self::TryShutdown => 9,
            Self::TestShutdown => 10,
            Self::GetNodeAddrs => 11,
            Self::LocalGet => 12,
            Self::ReplyToShutdown => 13,
        }
    }

    /// Maps a numeric identifier back onto a response.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::RingStatusGet,
            1 => Self::RingReenable,
            2 => Self::StateTrackStart,
            3 => Self::StateTrackStop,
            4 => Self::AdminStateSet,
            5 => Self::AdminStateGet,
            6 => Self::ServiceLoad,
            7 => Self::ServiceUnload,
            8 => Self::KillNode,
            9 => Self::TryShutdown,
            10 => Self::TestShutdown,
            11 => Self::GetNodeAddrs,
            12 => Self::LocalGet,
            13 => Self::ReplyToShutdown,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(RequestId::RingStatusGet, 0, 0)]
    #[case(RequestId::KillNode, 8, 8)]
    #[case(RequestId::ReplyToShutdown, 10, 13)]
    #[case(RequestId::GetNodeAddrs, 11, 11)]
    #[case(RequestId::LocalGet, 12, 12)]
    fn request_ids_pair_with_daemon_replies(
        #[case] request: RequestId,
        #[case] request_code: i32,
        #[case] response_code: i32,
    ) {
        assert_eq!(request.code(), request_code);
        assert_eq!(request.response().code(), response_code);
        assert_eq!(RequestId::from_code(request_code), Some(request));
    }

    #[test]
    fn shutdown_notification_shares_the_reply_to_shutdown_request_code() {
        assert_eq!(
            ResponseId::from_code(RequestId::ReplyToShutdown.code()),
            Some(ResponseId::TestShutdown)
        );
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(RequestId::from_code(13), None);
        assert_eq!(ResponseId::from_code(-1), None);
    }
}
