//! Layout constants shared by the daemon and its clients.

/// Maximum length of a name field, including the terminating NUL.
pub const CS_MAX_NAME_LENGTH: usize = 256;

/// Maximum number of ring interfaces reported by a ring status reply.
pub const MAX_INTERFACES: usize = 16;

/// Width of one interface name slot in a ring status reply.
pub const INTERFACE_NAME_LEN: usize = 128;

/// Width of one interface status slot in a ring status reply.
pub const INTERFACE_STATUS_LEN: usize = 512;

/// Width of one address slot in a node address reply.
pub const TOTEMIP_ADDRLEN: usize = 16;

/// Address family tag for IPv4 node addresses.
pub const AF_INET: u32 = 2;

/// Address family tag for IPv6 node addresses.
pub const AF_INET6: u32 = 10;

/// Conventional IPC endpoint name of the daemon.
pub const DEFAULT_IPC_NAME: &str = "corosync.ipc";
