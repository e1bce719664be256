//! Synchronous request/response exchanges.
//!
//! At most one exchange is in flight per instance: the response lock is held
//! from send until the reply is in hand. Each exchange decodes into a fresh
//! buffer, so a failed call never leaves a partially filled reply behind.

use corocfg_wire::{Request, Response, ResponseHeader};
use tracing::debug;

use crate::errors::CfgError;
use crate::instance::Instance;
use crate::transport::{ReplyBuffer, Transport};

pub(crate) const CALL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::call");

/// Zeroed reply buffer, failing softly when memory is short.
fn reply_buffer(size: usize) -> Result<Vec<u8>, CfgError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| CfgError::NoMemory)?;
    buffer.resize(size, 0);
    Ok(buffer)
}

/// Validates the reply header against the request it answers.
///
/// The daemon's embedded status wins over a transport-level success.
fn check_reply<Req: Request>(delivered: &[u8]) -> Result<(), CfgError> {
    let header = ResponseHeader::decode(delivered)?;
    header.expect_id(Req::ID.response())?;
    header.status()?;
    Ok(())
}

/// Dynamic reply handed back to the transport when dropped.
struct ReplyLease<'a> {
    transport: &'a dyn Transport,
    reply: Option<ReplyBuffer>,
}

impl ReplyLease<'_> {
    fn bytes(&self) -> &[u8] {
        self.reply.as_ref().map_or(&[], ReplyBuffer::as_bytes)
    }
}

impl Drop for ReplyLease<'_> {
    fn drop(&mut self) {
        if let Some(reply) = self.reply.take() {
            self.transport.release_reply(reply);
        }
    }
}

impl Instance {
    /// Sends `request` and decodes a reply of at most `capacity` bytes.
    pub(crate) fn exchange<Req, T>(
        &self,
        request: &Req,
        capacity: usize,
        decode: impl FnOnce(&[u8]) -> Result<T, CfgError>,
    ) -> Result<T, CfgError>
    where
        Req: Request,
    {
        let encoded = request.encode()?;
        let mut reply = reply_buffer(capacity)?;
        let delivered = {
            let _response = self.lock_response();
            if self.is_finalized() {
                return Err(CfgError::BadHandle);
            }
            self.transport().send_and_receive(&encoded, &mut reply)?
        };
        let bytes = reply
            .get(..delivered)
            .ok_or_else(|| CfgError::Library("transport over-reported a reply".to_owned()))?;
        check_reply::<Req>(bytes)?;
        debug!(target: CALL_TARGET, request = ?Req::ID, delivered, "reply received");
        decode(bytes)
    }

    /// Sends `request` and decodes a fixed-layout reply.
    pub(crate) fn call<Req, Res>(&self, request: &Req) -> Result<Res, CfgError>
    where
        Req: Request,
        Res: for<'a> Response<'a>,
    {
        self.exchange(request, <Res as Response<'_>>::SIZE, |bytes| {
            Ok(Res::decode(bytes)?)
        })
    }

    /// Sends `request` and decodes a reply sized by the transport.
    ///
    /// The reply is decoded and released before the response lock is
    /// dropped, so a concurrent finalize never races the release.
    pub(crate) fn exchange_dynamic<Req, T>(
        &self,
        request: &Req,
        decode: impl FnOnce(&[u8]) -> Result<T, CfgError>,
    ) -> Result<T, CfgError>
    where
        Req: Request,
    {
        let encoded = request.encode()?;
        let _response = self.lock_response();
        if self.is_finalized() {
            return Err(CfgError::BadHandle);
        }
        let lease = ReplyLease {
            transport: self.transport(),
            reply: Some(self.transport().send_and_receive_dynamic(&encoded)?),
        };
        check_reply::<Req>(lease.bytes())?;
        debug!(
            target: CALL_TARGET,
            request = ?Req::ID,
            delivered = lease.bytes().len(),
            "reply received"
        );
        decode(lease.bytes())
    }
}
