//! Daemon status codes embedded in every response header.

use thiserror::Error;

/// Numeric code the daemon uses for success.
pub const CS_OK: u32 = 1;

/// Failure statuses reported by the daemon or synthesised by the client.
///
/// Success is not a variant: it is represented by `Ok(())` from
/// [`status_from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum CsError {
    /// Internal library or protocol inconsistency.
    #[error("library error")]
    Library,
    /// Protocol version mismatch.
    #[error("version mismatch")]
    Version,
    /// Service not initialised.
    #[error("not initialised")]
    Init,
    /// Operation timed out.
    #[error("timed out")]
    Timeout,
    /// Resource temporarily unavailable; the operation may be retried.
    #[error("try again")]
    TryAgain,
    /// A parameter was rejected.
    #[error("invalid parameter")]
    InvalidParam,
    /// Allocation failed.
    #[error("out of memory")]
    NoMemory,
    /// The handle is unknown or already finalized.
    #[error("bad handle")]
    BadHandle,
    /// The resource is busy.
    #[error("busy")]
    Busy,
    /// Access denied.
    #[error("access denied")]
    Access,
    /// The object does not exist.
    #[error("does not exist")]
    NotExist,
    /// A name exceeded its fixed maximum length.
    #[error("name too long")]
    NameTooLong,
    /// The object already exists.
    #[error("already exists")]
    Exist,
    /// No space left.
    #[error("no space")]
    NoSpace,
    /// The operation was interrupted.
    #[error("interrupted")]
    Interrupt,
    /// The name was not found.
    #[error("name not found")]
    NameNotFound,
    /// No resources available.
    #[error("no resources")]
    NoResources,
    /// The operation is not supported.
    #[error("not supported")]
    NotSupported,
    /// The operation is not valid in the current state.
    #[error("bad operation")]
    BadOperation,
    /// The operation failed.
    #[error("failed operation")]
    FailedOperation,
    /// Message delivery error.
    #[error("message error")]
    MessageError,
    /// The queue is full.
    #[error("queue full")]
    QueueFull,
    /// The queue is unavailable.
    #[error("queue not available")]
    QueueNotAvailable,
    /// Flags were rejected.
    #[error("bad flags")]
    BadFlags,
    /// The message is too big.
    #[error("too big")]
    TooBig,
    /// No sections available.
    #[error("no sections")]
    NoSections,
    /// The context was not found.
    #[error("context not found")]
    ContextNotFound,
    /// Too many groups.
    #[error("too many groups")]
    TooManyGroups,
    /// Security failure.
    #[error("security error")]
    Security,
    /// A code outside the known catalogue.
    #[error("unknown status code {0}")]
    Unknown(u32),
}

impl CsError {
    /// Returns the numeric code transmitted on the wire.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Library => 2,
            Self::Version => 3,
            Self::Init => 4,
            Self::Timeout => 5,
            Self::TryAgain => 6,
            Self::InvalidParam => 7,
            Self::NoMemory => 8,
            Self::BadHandle => 9,
            Self::Busy => 10,
            Self::Access => 11,
            Self::NotExist => 12,
            Self::NameTooLong => 13,
            Self::Exist => 14,
            Self::NoSpace => 15,
            Self::Interrupt => 16,
            Self::NameNotFound => 17,
            Self::NoResources => 18,
            Self::NotSupported => 19,
            Self::BadOperation => 20,
            Self::FailedOperation => 21,
            Self::MessageError => 22,
            Self::QueueFull => 23,
            Self::QueueNotAvailable => 24,
            Self::BadFlags => 25,
            Self::TooBig => 26,
            Self::NoSections => 27,
            Self::ContextNotFound => 28,
            Self::TooManyGroups => 30,
            Self::Security => 100,
            Self::Unknown(code) => code,
        }
    }

    /// Maps a non-success code onto its variant.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            2 => Self::Library,
            3 => Self::Version,
            4 => Self::Init,
            5 => Self::Timeout,
            6 => Self::TryAgain,
            7 => Self::InvalidParam,
            8 => Self::NoMemory,
            9 => Self::BadHandle,
            10 => Self::Busy,
            11 => Self::Access,
            12 => Self::NotExist,
            13 => Self::NameTooLong,
            14 => Self::Exist,
            15 => Self::NoSpace,
            16 => Self::Interrupt,
            17 => Self::NameNotFound,
            18 => Self::NoResources,
            19 => Self::NotSupported,
            20 => Self::BadOperation,
            21 => Self::FailedOperation,
            22 => Self::MessageError,
            23 => Self::QueueFull,
            24 => Self::QueueNotAvailable,
            25 => Self::BadFlags,
            26 => Self::TooBig,
            27 => Self::NoSections,
            28 => Self::ContextNotFound,
            30 => Self::TooManyGroups,
            100 => Self::Security,
            other => Self::Unknown(other),
        }
    }

    /// Returns true when the status signals transient backpressure.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::TryAgain)
    }
}

/// Interprets a raw status code, mapping [`CS_OK`] to success.
///
/// # Errors
///
/// Returns the matching [`CsError`] for every code other than [`CS_OK`].
pub const fn status_from_code(code: u32) -> Result<(), CsError> {
    if code == CS_OK {
        Ok(())
    } else {
        Err(CsError::from_code(code))
    }
}
