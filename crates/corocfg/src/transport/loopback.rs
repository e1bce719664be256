//! In-memory transport for exercising client instances without a daemon.
//!
//! A [`LoopbackController`] scripts replies, queues notifications, simulates
//! backpressure, and records every operation. Its [`LoopbackConnector`]
//! opens transports that share the controller's state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use corocfg_wire::{
    AF_INET, Ack, CsError, LocalGetReply, NodeAddrsReply, RequestHeader, RequestId,
    RingStatusReply, ServiceId,
};

use super::{Connector, DispatchBuffer, PollTimeout, ReplyBuffer, Transport};
use crate::errors::TransportError;

/// Counters of operations observed by loopback transports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopbackStats {
    /// Transports opened.
    pub connects: usize,
    /// Send attempts, refused ones included.
    pub send_attempts: usize,
    /// Sends that reached the simulated daemon.
    pub sends: usize,
    /// Calls to `poll_next`.
    pub polls: usize,
    /// Notifications handed back.
    pub released_messages: usize,
    /// Dynamic replies handed back.
    pub released_replies: usize,
    /// Calls to `interrupt`.
    pub interrupts: usize,
    /// Calls to `disconnect`.
    pub disconnects: usize,
    /// Operations other than `interrupt` issued after `disconnect`.
    pub after_disconnect: usize,
}

/// Boundary of one request/response exchange, numbered by send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    /// The request was accepted.
    Begin(usize),
    /// The reply was produced.
    End(usize),
}

#[derive(Debug)]
struct State {
    replies: VecDeque<Vec<u8>>,
    notifications: VecDeque<Vec<u8>>,
    capacity: Option<usize>,
    refusals: usize,
    local_nodeid: u32,
    selection_fd: i32,
    reply_delay: Duration,
    connect_failure: Option<CsError>,
    services: Vec<ServiceId>,
    requests: Vec<Vec<u8>>,
    events: Vec<CallEvent>,
    stats: LoopbackStats,
}

impl Default for State {
    fn default() -> Self {
        Self {
            replies: VecDeque::new(),
            notifications: VecDeque::new(),
            capacity: None,
            refusals: 0,
            local_nodeid: 1,
            selection_fd: -1,
            reply_delay: Duration::ZERO,
            connect_failure: None,
            services: Vec::new(),
            requests: Vec::new(),
            events: Vec::new(),
            stats: LoopbackStats::default(),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    arrived: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Scripting and inspection side of the loopback transport.
#[derive(Debug, Clone, Default)]
pub struct LoopbackController {
    shared: Arc<Shared>,
}

impl LoopbackController {
    /// Creates a controller with empty queues.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector whose transports share this controller's state.
    #[must_use]
    pub fn connector(&self) -> LoopbackConnector {
        LoopbackConnector {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Queues the reply for the next accepted request.
    ///
    /// Requests without a scripted reply receive a successful default
    /// reply matching their identifier.
    pub fn push_reply(&self, bytes: Vec<u8>) {
        self.shared.lock().replies.push_back(bytes);
    }

    /// Queues a notification on the dispatch stream.
    pub fn inject(&self, bytes: Vec<u8>) {
        self.shared.lock().notifications.push_back(bytes);
        self.shared.arrived.notify_all();
    }

    /// Limits the size of a request the transport will buffer.
    pub fn set_capacity(&self, capacity: Option<usize>) {
        self.shared.lock().capacity = capacity;
    }

    /// Refuses the next `count` sends with backpressure.
    pub fn refuse_next(&self, count: usize) {
        self.shared.lock().refusals = count;
    }

    /// Node id reported by default local-node replies.
    pub fn set_local_nodeid(&self, nodeid: u32) {
        self.shared.lock().local_nodeid = nodeid;
    }

    /// Descriptor reported by [`Transport::selection_fd`].
    pub fn set_selection_fd(&self, fd: i32) {
        self.shared.lock().selection_fd = fd;
    }

    /// Time each exchange spends between accepting a request and replying.
    pub fn set_reply_delay(&self, delay: Duration) {
        self.shared.lock().reply_delay = delay;
    }

    /// Makes the next connections fail as if the daemon refused them.
    pub fn fail_connect(&self, status: Option<CsError>) {
        self.shared.lock().connect_failure = status;
    }

    /// Operation counters.
    #[must_use]
    pub fn stats(&self) -> LoopbackStats {
        self.shared.lock().stats
    }

    /// Accepted requests in send order.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.shared.lock().requests.clone()
    }

    /// Exchange boundaries in the order they happened.
    #[must_use]
    pub fn events(&self) -> Vec<CallEvent> {
        self.shared.lock().events.clone()
    }

    /// Services transports were opened for.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceId> {
        self.shared.lock().services.clone()
    }

    /// Notifications not yet polled.
    #[must_use]
    pub fn pending_notifications(&self) -> usize {
        self.shared.lock().notifications.len()
    }
}

/// Opens [`LoopbackTransport`]s for a [`LoopbackController`].
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    shared: Arc<Shared>,
}

impl Connector for LoopbackConnector {
    fn connect(&self, service: ServiceId) -> Result<Box<dyn Transport>, TransportError> {
        let mut state = self.shared.lock();
        if let Some(status) = state.connect_failure {
            return Err(TransportError::Refused {
                channel: "response",
                status,
            });
        }
        state.stats.connects = state.stats.connects.saturating_add(1);
        state.services.push(service);
        drop(state);
        Ok(Box::new(LoopbackTransport {
            shared: Arc::clone(&self.shared),
            interrupted: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        }))
    }
}

/// Transport backed by a [`LoopbackController`].
#[derive(Debug)]
pub struct LoopbackTransport {
    shared: Arc<Shared>,
    interrupted: AtomicBool,
    disconnected: AtomicBool,
}

impl LoopbackTransport {
    /// Counts the operation and reports whether the transport is still open.
    fn enter(&self, state: &mut State) -> Result<(), TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            state.stats.after_disconnect = state.stats.after_disconnect.saturating_add(1);
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        let (sequence, delay) = {
            let mut state = self.shared.lock();
            self.enter(&mut state)?;
            state.stats.send_attempts = state.stats.send_attempts.saturating_add(1);
            if state.capacity.is_some_and(|capacity| request.len() > capacity) {
                return Err(TransportError::TryAgain);
            }
            if state.refusals > 0 {
                state.refusals = state.refusals.saturating_sub(1);
                return Err(TransportError::TryAgain);
            }
            state.stats.sends = state.stats.sends.saturating_add(1);
            let sequence = state.stats.sends;
            state.requests.push(request.to_vec());
            state.events.push(CallEvent::Begin(sequence));
            (sequence, state.reply_delay)
        };

        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.shared.lock();
        state.events.push(CallEvent::End(sequence));
        match state.replies.pop_front() {
            Some(reply) => Ok(reply),
            None => default_reply(request, state.local_nodeid),
        }
    }
}

fn default_reply(request: &[u8], local_nodeid: u32) -> Result<Vec<u8>, TransportError> {
    let header = RequestHeader::decode(request)?;
    let reply = match header.id {
        RequestId::LocalGet => LocalGetReply::encode(local_nodeid),
        RequestId::RingStatusGet => RingStatusReply::encode(&[])?,
        RequestId::GetNodeAddrs => NodeAddrsReply::encode(AF_INET, &[]),
        id => Ack::encode(id.response()),
    };
    Ok(reply)
}

impl Transport for LoopbackTransport {
    fn selection_fd(&self) -> i32 {
        self.shared.lock().selection_fd
    }

    fn send_and_receive(&self, request: &[u8], reply: &mut [u8]) -> Result<usize, TransportError> {
        let bytes = self.exchange(request)?;
        let copied = bytes.len().min(reply.len());
        if let (Some(target), Some(source)) = (reply.get_mut(..copied), bytes.get(..copied)) {
            target.copy_from_slice(source);
        }
        Ok(copied)
    }

    fn send_and_receive_dynamic(&self, request: &[u8]) -> Result<ReplyBuffer, TransportError> {
        self.exchange(request).map(ReplyBuffer::new)
    }

    fn release_reply(&self, reply: ReplyBuffer) {
        let mut state = self.shared.lock();
        if self.enter(&mut state).is_ok() {
            state.stats.released_replies = state.stats.released_replies.saturating_add(1);
        }
        drop(reply);
    }

    fn poll_next(&self, timeout: PollTimeout) -> Result<Option<DispatchBuffer>, TransportError> {
        let mut state = self.shared.lock();
        self.enter(&mut state)?;
        state.stats.polls = state.stats.polls.saturating_add(1);
        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                return Ok(None);
            }
            if let Some(bytes) = state.notifications.pop_front() {
                return Ok(Some(DispatchBuffer::new(bytes)));
            }
            match timeout {
                PollTimeout::Immediate => return Ok(None),
                PollTimeout::Infinite => {
                    state = self
                        .shared
                        .arrived
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn release_message(&self, message: DispatchBuffer) {
        let mut state = self.shared.lock();
        if self.enter(&mut state).is_ok() {
            state.stats.released_messages = state.stats.released_messages.saturating_add(1);
        }
        drop(message);
    }

    fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        // Taking the lock orders the flag before any waiter re-checks it.
        let mut state = self.shared.lock();
        state.stats.interrupts = state.stats.interrupts.saturating_add(1);
        drop(state);
        self.shared.arrived.notify_all();
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.shared.lock();
        if self.disconnected.swap(true, Ordering::SeqCst) {
            state.stats.after_disconnect = state.stats.after_disconnect.saturating_add(1);
        }
        state.stats.disconnects = state.stats.disconnects.saturating_add(1);
        Ok(())
    }
}
