use std::time::Duration;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Socket path the daemon listens on in a stock installation.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/corosync/corosync.ipc";

/// Default log filter; the tool stays quiet unless something goes wrong.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Connect timeout for each daemon stream.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Transport buffering and reassembly limit.
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 1024 * 1024;

/// Attempts made for an operation refused with backpressure.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;

/// First backoff delay after backpressure.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default daemon endpoint.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    SocketEndpoint::unix(DEFAULT_SOCKET_PATH)
}

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default log format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
