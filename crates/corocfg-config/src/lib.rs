//! Layered configuration for the cluster configuration client.
//!
//! Values resolve from built-in defaults, then a TOML file
//! (`--config-path` or `COROCFG_CONFIG_PATH`), then `COROCFG_*` environment
//! variables, then command-line flags, with later layers winning.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_LOG_FILTER, DEFAULT_MAX_MESSAGE_SIZE,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_SOCKET_PATH, default_log_filter,
    default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError};

use defaults::duration_millis;

/// Resolved configuration shared by the library's socket transport and the
/// operator tool.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COROCFG")]
pub struct Config {
    /// Daemon endpoint.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// Connect timeout per stream, in milliseconds.
    #[ortho_config(default = duration_millis(DEFAULT_CONNECT_TIMEOUT))]
    pub connect_timeout_ms: u64,
    /// Transport buffering and reassembly limit, in bytes.
    #[ortho_config(default = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: u32,
    /// Attempts for operations refused with backpressure, first included.
    #[ortho_config(default = DEFAULT_RETRY_ATTEMPTS)]
    pub retry_attempts: u32,
    /// First backoff delay, in milliseconds.
    #[ortho_config(default = duration_millis(DEFAULT_RETRY_DELAY))]
    pub retry_delay_ms: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = DEFAULT_LOG_FILTER.to_owned())]
    pub log_filter: String,
    /// Diagnostic log format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            connect_timeout_ms: duration_millis(DEFAULT_CONNECT_TIMEOUT),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: duration_millis(DEFAULT_RETRY_DELAY),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Daemon endpoint.
    #[must_use]
    pub const fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Connect timeout per stream.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Transport buffering and reassembly limit, in bytes.
    #[must_use]
    pub const fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    /// Attempts for operations refused with backpressure.
    #[must_use]
    pub const fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    /// First backoff delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Diagnostic log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
