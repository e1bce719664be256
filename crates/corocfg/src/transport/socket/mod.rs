//! Stream-socket transport speaking to a running daemon.
//!
//! Each client connection opens two streams to the daemon endpoint. The
//! first carries requests and their replies, the second carries
//! notifications. Both begin with a setup handshake naming the service and
//! the stream's role. Records are framed by the size in their header.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use corocfg_config::{
    Config, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE, SocketEndpoint,
    default_socket_endpoint,
};
use corocfg_wire::{
    Channel, SETUP_RESPONSE_LEN, ServiceId, SetupRequest, SetupResponse, declared_size,
};
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::{debug, warn};

use super::{Connector, DispatchBuffer, PollTimeout, ReplyBuffer, TRANSPORT_TARGET, Transport};
use crate::errors::TransportError;

const FRAME_PREFIX_LEN: usize = 4;

#[derive(Debug)]
enum Connection {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl Connection {
    fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown(how),
            Self::Unix(stream) => stream.shutdown(how),
        }
    }

    fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_nonblocking(nonblocking),
            Self::Unix(stream) => stream.set_nonblocking(nonblocking),
        }
    }

    fn raw_fd(&self) -> RawFd {
        match self {
            Self::Tcp(stream) => stream.as_raw_fd(),
            Self::Unix(stream) => stream.as_raw_fd(),
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            Self::Unix(stream) => stream.flush(),
        }
    }
}

fn connect(endpoint: &SocketEndpoint, timeout: Duration) -> Result<Connection, TransportError> {
    let connected = match endpoint {
        SocketEndpoint::Tcp { host, port } => resolve_tcp_address(host, *port)
            .and_then(|address| TcpStream::connect_timeout(&address, timeout))
            .map(Connection::Tcp),
        SocketEndpoint::Unix { path } => connect_unix(path.as_str(), timeout),
    };
    connected.map_err(|source| TransportError::Connect {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn resolve_tcp_address(host: &str, port: u16) -> io::Result<SocketAddr> {
    let mut addrs = (host, port).to_socket_addrs()?;
    addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

fn connect_unix(path: &str, timeout: Duration) -> io::Result<Connection> {
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    let address = SockAddr::unix(path)?;
    socket.connect_timeout(&address, timeout)?;
    let stream: UnixStream = socket.into();
    Ok(Connection::Unix(stream))
}

const fn channel_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Response => "response",
        Channel::Dispatch => "dispatch",
    }
}

fn handshake(
    stream: &mut Connection,
    service: ServiceId,
    channel: Channel,
    max_message_size: u32,
) -> Result<(), TransportError> {
    let request = SetupRequest {
        service,
        channel,
        max_message_size,
    };
    stream.write_all(&request.encode())?;
    let mut answer = [0_u8; SETUP_RESPONSE_LEN];
    read_exact(stream, &mut answer)?;
    SetupResponse::decode(&answer)?
        .status()
        .map_err(|status| TransportError::Refused {
            channel: channel_name(channel),
            status,
        })
}

fn read_exact(stream: &mut Connection, buf: &mut [u8]) -> Result<(), TransportError> {
    stream.read_exact(buf).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::Closed
        } else {
            TransportError::Io(error)
        }
    })
}

/// Reads one size-framed record.
fn read_frame(stream: &mut Connection, limit: usize) -> Result<Vec<u8>, TransportError> {
    let mut prefix = [0_u8; FRAME_PREFIX_LEN];
    read_exact(stream, &mut prefix)?;
    let size = declared_size(&prefix)?;
    if size > limit {
        return Err(TransportError::TooLarge { size, limit });
    }
    let mut frame = Vec::new();
    frame
        .try_reserve_exact(size)
        .map_err(|_| io::Error::from(io::ErrorKind::OutOfMemory))?;
    frame.extend_from_slice(&prefix);
    frame.resize(size, 0);
    read_exact(stream, frame.get_mut(FRAME_PREFIX_LEN..).unwrap_or_default())?;
    Ok(frame)
}

/// Writes `request`, refusing with backpressure when not a single byte can
/// be buffered.
fn write_request(stream: &mut Connection, request: &[u8]) -> Result<(), TransportError> {
    stream.set_nonblocking(true)?;
    let first = stream.write(request);
    stream.set_nonblocking(false)?;
    let written = match first {
        Ok(written) => written,
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
            return Err(TransportError::TryAgain);
        }
        Err(error) => return Err(error.into()),
    };
    stream.write_all(request.get(written..).unwrap_or_default())?;
    stream.flush()?;
    Ok(())
}

/// Waits until `fd` is readable. Returns `false` on timeout or when a
/// signal cut the wait short.
fn wait_readable(fd: RawFd, timeout: PollTimeout) -> Result<bool, TransportError> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = match timeout {
        PollTimeout::Immediate => 0,
        PollTimeout::Infinite => -1,
    };
    // SAFETY: `pollfd` is a single valid entry borrowed exclusively for the
    // duration of the call, matching the count of one passed to `poll(2)`.
    let ready = unsafe { libc::poll(&raw mut pollfd, 1, millis) };
    if ready < 0 {
        let error = io::Error::last_os_error();
        if error.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(error.into());
    }
    Ok(ready > 0)
}

fn lock(stream: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    stream.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opens [`SocketTransport`]s to a daemon endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConnector {
    endpoint: SocketEndpoint,
    connect_timeout: Duration,
    max_message_size: u32,
}

impl SocketConnector {
    /// Connector for `endpoint` with default timeout and size limit.
    #[must_use]
    pub const fn new(endpoint: SocketEndpoint) -> Self {
        Self {
            endpoint,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Connector configured from resolved settings.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.daemon_socket().clone(),
            connect_timeout: config.connect_timeout(),
            max_message_size: config.max_message_size(),
        }
    }

    /// Overrides the per-stream connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the message size limit.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: u32) -> Self {
        self.max_message_size = size;
        self
    }

    /// Endpoint this connector dials.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }
}

impl Default for SocketConnector {
    fn default() -> Self {
        Self::new(default_socket_endpoint())
    }
}

impl Connector for SocketConnector {
    fn connect(&self, service: ServiceId) -> Result<Box<dyn Transport>, TransportError> {
        let transport = SocketTransport::open(
            &self.endpoint,
            service,
            self.connect_timeout,
            self.max_message_size,
        )?;
        Ok(Box::new(transport))
    }
}

/// Daemon connection over a Unix or TCP stream pair.
#[derive(Debug)]
pub struct SocketTransport {
    response: Mutex<Connection>,
    dispatch: Mutex<Connection>,
    // Clones used to shut the streams down without waiting for their locks.
    response_control: Connection,
    dispatch_control: Connection,
    selection_fd: RawFd,
    limit: usize,
    interrupted: AtomicBool,
    closed: AtomicBool,
    // Set once a stream may hold a partial frame; its framing is lost.
    desynced: AtomicBool,
}

impl SocketTransport {
    /// Connects both streams and performs their handshakes.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] when the endpoint is unreachable
    /// and [`TransportError::Refused`] when the daemon rejects a stream.
    pub fn open(
        endpoint: &SocketEndpoint,
        service: ServiceId,
        timeout: Duration,
        max_message_size: u32,
    ) -> Result<Self, TransportError> {
        let mut response = connect(endpoint, timeout)?;
        handshake(&mut response, service, Channel::Response, max_message_size)?;
        let mut dispatch = connect(endpoint, timeout)?;
        handshake(&mut dispatch, service, Channel::Dispatch, max_message_size)?;

        let response_control = response.try_clone()?;
        let dispatch_control = dispatch.try_clone()?;
        let selection_fd = dispatch.raw_fd();
        debug!(
            target: TRANSPORT_TARGET,
            endpoint = %endpoint,
            service = %service,
            "daemon streams established"
        );
        Ok(Self {
            response: Mutex::new(response),
            dispatch: Mutex::new(dispatch),
            response_control,
            dispatch_control,
            selection_fd,
            limit: usize::try_from(max_message_size).unwrap_or(usize::MAX),
            interrupted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            desynced: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) || self.desynced.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    /// Refuses every later exchange; bytes left on the stream would be read
    /// as the next record.
    fn desync(&self, stream: &'static str, error: &TransportError) {
        if !self.desynced.swap(true, Ordering::AcqRel) {
            warn!(
                target: TRANSPORT_TARGET,
                stream,
                error = %error,
                "stream lost its framing; refusing further exchanges"
            );
        }
    }

    fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.ensure_open()?;
        if request.len() > self.limit {
            return Err(TransportError::TooLarge {
                size: request.len(),
                limit: self.limit,
            });
        }
        let mut stream = lock(&self.response);
        self.ensure_open()?;
        match write_request(&mut stream, request) {
            Ok(()) => {}
            Err(TransportError::TryAgain) => return Err(TransportError::TryAgain),
            Err(error) => {
                self.desync("response", &error);
                return Err(error);
            }
        }
        read_frame(&mut stream, self.limit).inspect_err(|error| self.desync("response", error))
    }
}

impl Transport for SocketTransport {
    fn selection_fd(&self) -> i32 {
        self.selection_fd
    }

    fn send_and_receive(&self, request: &[u8], reply: &mut [u8]) -> Result<usize, TransportError> {
        let frame = self.exchange(request)?;
        let copied = frame.len().min(reply.len());
        if let (Some(target), Some(source)) = (reply.get_mut(..copied), frame.get(..copied)) {
            target.copy_from_slice(source);
        }
        Ok(copied)
    }

    fn send_and_receive_dynamic(&self, request: &[u8]) -> Result<ReplyBuffer, TransportError> {
        self.exchange(request).map(ReplyBuffer::new)
    }

    fn poll_next(&self, timeout: PollTimeout) -> Result<Option<DispatchBuffer>, TransportError> {
        self.ensure_open()?;
        if self.interrupted.load(Ordering::Acquire) {
            return Ok(None);
        }
        let mut stream = lock(&self.dispatch);
        if !wait_readable(self.selection_fd, timeout)? || self.interrupted.load(Ordering::Acquire)
        {
            return Ok(None);
        }
        match read_frame(&mut stream, self.limit) {
            Ok(frame) => Ok(Some(DispatchBuffer::new(frame))),
            Err(TransportError::Closed) if self.interrupted.load(Ordering::Acquire) => Ok(None),
            Err(error) => {
                self.desync("dispatch", &error);
                Err(error)
            }
        }
    }

    fn interrupt(&self) {
        if self.interrupted.swap(true, Ordering::AcqRel) {
            return;
        }
        // A read shutdown wakes a blocked poll with end-of-stream.
        if let Err(error) = self.dispatch_control.shutdown(Shutdown::Read) {
            debug!(
                target: TRANSPORT_TARGET,
                error = %error,
                "dispatch stream already shut down"
            );
        }
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let outcomes = [
            self.response_control.shutdown(Shutdown::Both),
            self.dispatch_control.shutdown(Shutdown::Both),
        ];
        debug!(target: TRANSPORT_TARGET, "daemon streams closed");
        for outcome in outcomes {
            match outcome {
                Err(error) if error.kind() != io::ErrorKind::NotConnected => {
                    return Err(error.into());
                }
                _ => {}
            }
        }
        Ok(())
    }
}
