//! Configuration service calls.
//!
//! Each call resolves the handle, performs one exchange and lets the guard
//! release the handle on every path.

use corocfg_wire::{
    Ack, CS_MAX_NAME_LENGTH, GetNodeAddrs, KillNode, LocalGet, LocalGetReply, NodeAddrsReply,
    ReplyToShutdown, Response, RingReenable, RingStatusGet, RingStatusReply, ServiceLoad,
    ServiceUnload, ShutdownFlags, ShutdownReply, StateTrackStart, StateTrackStop, TryShutdown,
};

use crate::client::CfgHandle;
use crate::decode::{self, NodeAddresses, RingStatus};
use crate::errors::CfgError;

/// Rejects names that do not fit a fixed-width field with its terminator.
const fn check_name(name: &str) -> Result<(), CfgError> {
    if name.len() >= CS_MAX_NAME_LENGTH {
        return Err(CfgError::NameTooLong {
            length: name.len(),
            max: CS_MAX_NAME_LENGTH,
        });
    }
    Ok(())
}

impl CfgHandle {
    /// Status of every ring interface.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::BadHandle`] for unknown handles, the daemon's
    /// status when it refuses, [`CfgError::NoMemory`] when the result cannot
    /// be allocated, and [`CfgError::Library`] for inconsistent replies.
    pub fn ring_status_get(self) -> Result<Vec<RingStatus>, CfgError> {
        let instance = self.resolve()?;
        instance.exchange(&RingStatusGet, RingStatusReply::SIZE, |bytes| {
            decode::ring_status(&RingStatusReply::decode(bytes)?)
        })
    }

    /// Re-enables redundant rings after a fault.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::BadHandle`] for unknown handles and the daemon's
    /// status when it refuses.
    pub fn ring_reenable(self) -> Result<(), CfgError> {
        let instance = self.resolve()?;
        instance.call::<_, Ack>(&RingReenable).map(drop)
    }

    /// Loads the daemon service `name` at `version`.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::NameTooLong`] before touching the handle when
    /// `name` is 256 bytes or longer, otherwise as for
    /// [`CfgHandle::ring_reenable`].
    pub fn service_load(self, name: &str, version: u32) -> Result<(), CfgError> {
        check_name(name)?;
        let instance = self.resolve()?;
        instance
            .call::<_, Ack>(&ServiceLoad { name, version })
            .map(drop)
    }

    /// Unloads the daemon service `name` at `version`.
    ///
    /// # Errors
    ///
    /// As for [`CfgHandle::service_load`].
    pub fn service_unload(self, name: &str, version: u32) -> Result<(), CfgError> {
        check_name(name)?;
        let instance = self.resolve()?;
        instance
            .call::<_, Ack>(&ServiceUnload { name, version })
            .map(drop)
    }

    /// Starts configuration state tracking with opaque `flags`.
    ///
    /// # Errors
    ///
    /// As for [`CfgHandle::ring_reenable`].
    pub fn state_track(self, flags: u8) -> Result<(), CfgError> {
        let instance = self.resolve()?;
        instance
            .call::<_, Ack>(&StateTrackStart { flags })
            .map(drop)
    }

    /// Stops configuration state tracking.
    ///
    /// # Errors
    ///
    /// As for [`CfgHandle::ring_reenable`].
    pub fn state_track_stop(self) -> Result<(), CfgError> {
        let instance = self.resolve()?;
        instance.call::<_, Ack>(&StateTrackStop).map(drop)
    }

    /// Kills cluster node `nodeid`, recording `reason`.
    ///
    /// # Errors
    ///
    /// Returns [`CfgError::NameTooLong`] without any transport interaction
    /// when `reason` is 256 bytes or longer, otherwise as for
    /// [`CfgHandle::ring_reenable`].
    pub fn kill_node(self, nodeid: u32, reason: &str) -> Result<(), CfgError> {
        check_name(reason)?;
        let instance = self.resolve()?;
        instance
            .call::<_, Ack>(&KillNode { nodeid, reason })
            .map(drop)
    }

    /// Asks the cluster to shut down under policy `flags`.
    ///
    /// # Errors
    ///
    /// As for [`CfgHandle::ring_reenable`]; the daemon answers
    /// [`CsError::Busy`](corocfg_wire::CsError::Busy) when a client vetoes.
    pub fn try_shutdown(self, flags: ShutdownFlags) -> Result<(), CfgError> {
        let instance = self.resolve()?;
        instance
            .call::<_, Ack>(&TryShutdown { flags })
            .map(drop)
    }

    /// Answers a shutdown request received through dispatch.
    ///
    /// # Errors
    ///
    /// As for [`CfgHandle::ring_reenable`].
    pub fn replyto_shutdown(self, reply: ShutdownReply) -> Result<(), CfgError> {
        let instance = self.resolve()?;
        instance
            .call::<_, Ack>(&ReplyToShutdown { reply })
            .map(drop)
    }

    /// Addresses of node `nodeid`, decoding at most `max_addrs` of them.
    ///
    /// # Errors
    ///
    /// As for [`CfgHandle::ring_status_get`].
    pub fn get_node_addrs(self, nodeid: u32, max_addrs: usize) -> Result<NodeAddresses, CfgError> {
        let instance = self.resolve()?;
        instance.exchange_dynamic(&GetNodeAddrs { nodeid }, |bytes| {
            decode::node_addresses(&NodeAddrsReply::decode(bytes)?, max_addrs)
        })
    }

    /// Id of the node the daemon runs on.
    ///
    /// # Errors
    ///
    /// As for [`CfgHandle::ring_reenable`].
    pub fn local_get(self) -> Result<u32, CfgError> {
        let instance = self.resolve()?;
        let reply: LocalGetReply = instance.call(&LocalGet)?;
        Ok(reply.local_nodeid)
    }
}
