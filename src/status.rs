//! Status codes reported by the libplctag engine.
//!
//! Every engine call returns an `int` status. Positive values other than
//! [`StatusCode::Pending`] are not produced by the engine for status calls;
//! zero means success and negative values are errors.
//!
//! # Example
//!
//! ```
//! use ab_plctag::StatusCode;
//!
//! let status = StatusCode::from_code(-32);
//! assert_eq!(status, StatusCode::ErrTimeout);
//! assert!(status.is_error());
//! assert_eq!(status.to_string(), "PLCTAG_ERR_TIMEOUT");
//! assert_eq!(status.code(), -32);
//! ```

/// Status of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Operation in progress. Not an error.
    Pending,
    /// No error.
    Ok,
    /// The operation was aborted.
    ErrAbort,
    /// The operation failed due to incorrect configuration.
    ErrBadConfig,
    /// The connection failed for some reason.
    ErrBadConnection,
    /// The data received from the remote PLC was undecipherable.
    ErrBadData,
    /// Something addressed does not exist on the remote system.
    ErrBadDevice,
    /// The library is unable to connect to a remote system.
    ErrBadGateway,
    /// Something is not correct with the tag attribute string.
    ErrBadParam,
    /// The remote system returned an unexpected response.
    ErrBadReply,
    /// Something on the remote system is not in a good state.
    ErrBadStatus,
    /// An error occurred trying to close some resource.
    ErrClose,
    /// An error occurred trying to create some internal resource.
    ErrCreate,
    /// Something was incorrectly duplicated (e.g. a connection ID).
    ErrDuplicate,
    /// Some data such as a tag name could not be encoded.
    ErrEncode,
    /// Internal mutex destroy failure.
    ErrMutexDestroy,
    /// Internal mutex init failure.
    ErrMutexInit,
    /// Internal mutex lock failure.
    ErrMutexLock,
    /// Internal mutex unlock failure.
    ErrMutexUnlock,
    /// The operation is not permitted.
    ErrNotAllowed,
    /// Something was not found.
    ErrNotFound,
    /// A valid operation is not implemented.
    ErrNotImplemented,
    /// Expected data is not present.
    ErrNoData,
    /// Similar to `ErrNotFound`.
    ErrNoMatch,
    /// Memory allocation failed.
    ErrNoMem,
    /// Resource allocation failed on the remote system.
    ErrNoResources,
    /// Invalid handle or internal null pointer.
    ErrNullPtr,
    /// A resource such as a socket could not be opened.
    ErrOpen,
    /// Access outside of the tag data bounds.
    ErrOutOfBounds,
    /// An error occurred during a read, usually a socket problem.
    ErrRead,
    /// An unspecified or untranslatable remote error.
    ErrRemoteErr,
    /// Thread creation failed inside the engine.
    ErrThreadCreate,
    /// Thread join failed inside the engine.
    ErrThreadJoin,
    /// The operation took too long and timed out.
    ErrTimeout,
    /// More data was returned than expected.
    ErrTooLarge,
    /// Insufficient data was returned.
    ErrTooSmall,
    /// The operation is not supported on the remote system.
    ErrUnsupported,
    /// A Winsock-specific error occurred (Windows only).
    ErrWinsock,
    /// An error occurred trying to write, usually to a socket.
    ErrWrite,
    /// A code this library does not know.
    Unknown(i32),
}

// Indexed by `-code` for the error range -1..=-37.
const ERRORS: [StatusCode; 37] = [
    StatusCode::ErrAbort,
    StatusCode::ErrBadConfig,
    StatusCode::ErrBadConnection,
    StatusCode::ErrBadData,
    StatusCode::ErrBadDevice,
    StatusCode::ErrBadGateway,
    StatusCode::ErrBadParam,
    StatusCode::ErrBadReply,
    StatusCode::ErrBadStatus,
    StatusCode::ErrClose,
    StatusCode::ErrCreate,
    StatusCode::ErrDuplicate,
    StatusCode::ErrEncode,
    StatusCode::ErrMutexDestroy,
    StatusCode::ErrMutexInit,
    StatusCode::ErrMutexLock,
    StatusCode::ErrMutexUnlock,
    StatusCode::ErrNotAllowed,
    StatusCode::ErrNotFound,
    StatusCode::ErrNotImplemented,
    StatusCode::ErrNoData,
    StatusCode::ErrNoMatch,
    StatusCode::ErrNoMem,
    StatusCode::ErrNoResources,
    StatusCode::ErrNullPtr,
    StatusCode::ErrOpen,
    StatusCode::ErrOutOfBounds,
    StatusCode::ErrRead,
    StatusCode::ErrRemoteErr,
    StatusCode::ErrThreadCreate,
    StatusCode::ErrThreadJoin,
    StatusCode::ErrTimeout,
    StatusCode::ErrTooLarge,
    StatusCode::ErrTooSmall,
    StatusCode::ErrUnsupported,
    StatusCode::ErrWinsock,
    StatusCode::ErrWrite,
];

impl StatusCode {
    /// Maps a raw engine code to a status.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => StatusCode::Pending,
            0 => StatusCode::Ok,
            -37..=-1 => ERRORS[(-code - 1) as usize],
            other => StatusCode::Unknown(other),
        }
    }

    /// Returns the raw engine code.
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Pending => 1,
            StatusCode::Ok => 0,
            StatusCode::Unknown(code) => code,
            known => ERRORS
                .iter()
                .position(|&s| s == known)
                .map(|i| -(i as i32) - 1)
                .unwrap_or(i32::MIN),
        }
    }

    /// Returns whether the status represents an error (code < 0).
    pub fn is_error(self) -> bool {
        self.code() < 0
    }

    /// Returns whether the operation is still in progress.
    pub fn is_pending(self) -> bool {
        self == StatusCode::Pending
    }

    /// Returns whether the operation completed without error.
    pub fn is_ok(self) -> bool {
        self == StatusCode::Ok
    }

    /// Built-in description of the status.
    pub fn description(self) -> &'static str {
        match self {
            StatusCode::Pending => "Operation in progress",
            StatusCode::Ok => "No error",
            StatusCode::ErrAbort => "The operation was aborted",
            StatusCode::ErrBadConfig => "The operation failed due to incorrect configuration",
            StatusCode::ErrBadConnection => "The connection failed",
            StatusCode::ErrBadData => "The data received from the remote PLC was undecipherable",
            StatusCode::ErrBadDevice => "Addressed device does not exist",
            StatusCode::ErrBadGateway => "Unable to connect to the remote system",
            StatusCode::ErrBadParam => "Bad tag attribute string or parameter",
            StatusCode::ErrBadReply => "The remote system returned an unexpected response",
            StatusCode::ErrBadStatus => "The remote system is not in a good state",
            StatusCode::ErrClose => "Error closing a resource",
            StatusCode::ErrCreate => "Error creating an internal resource",
            StatusCode::ErrDuplicate => "Something is incorrectly duplicated",
            StatusCode::ErrEncode => "Error encoding data such as a tag name",
            StatusCode::ErrMutexDestroy => "Internal error destroying a mutex",
            StatusCode::ErrMutexInit => "Internal error initializing a mutex",
            StatusCode::ErrMutexLock => "Internal error locking a mutex",
            StatusCode::ErrMutexUnlock => "Internal error unlocking a mutex",
            StatusCode::ErrNotAllowed => "Operation not permitted",
            StatusCode::ErrNotFound => "Not found",
            StatusCode::ErrNotImplemented => "Operation not implemented",
            StatusCode::ErrNoData => "Expected data is not present",
            StatusCode::ErrNoMatch => "No match",
            StatusCode::ErrNoMem => "Memory allocation failed",
            StatusCode::ErrNoResources => "Remote resource allocation failed",
            StatusCode::ErrNullPtr => "Invalid handle or null pointer",
            StatusCode::ErrOpen => "Error opening a resource such as a socket",
            StatusCode::ErrOutOfBounds => "Access outside of the tag data bounds",
            StatusCode::ErrRead => "Error during a read operation",
            StatusCode::ErrRemoteErr => "Unspecified remote error",
            StatusCode::ErrThreadCreate => "Internal error creating a thread",
            StatusCode::ErrThreadJoin => "Internal error joining a thread",
            StatusCode::ErrTimeout => "The operation timed out",
            StatusCode::ErrTooLarge => "More data was returned than expected",
            StatusCode::ErrTooSmall => "Insufficient data was returned",
            StatusCode::ErrUnsupported => "Operation not supported by the remote system",
            StatusCode::ErrWinsock => "Winsock error",
            StatusCode::ErrWrite => "Error during a write operation",
            StatusCode::Unknown(_) => "Unknown status code",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            StatusCode::Pending => "PLCTAG_STATUS_PENDING",
            StatusCode::Ok => "PLCTAG_STATUS_OK",
            StatusCode::ErrAbort => "PLCTAG_ERR_ABORT",
            StatusCode::ErrBadConfig => "PLCTAG_ERR_BAD_CONFIG",
            StatusCode::ErrBadConnection => "PLCTAG_ERR_BAD_CONNECTION",
            StatusCode::ErrBadData => "PLCTAG_ERR_BAD_DATA",
            StatusCode::ErrBadDevice => "PLCTAG_ERR_BAD_DEVICE",
            StatusCode::ErrBadGateway => "PLCTAG_ERR_BAD_GATEWAY",
            StatusCode::ErrBadParam => "PLCTAG_ERR_BAD_PARAM",
            StatusCode::ErrBadReply => "PLCTAG_ERR_BAD_REPLY",
            StatusCode::ErrBadStatus => "PLCTAG_ERR_BAD_STATUS",
            StatusCode::ErrClose => "PLCTAG_ERR_CLOSE",
            StatusCode::ErrCreate => "PLCTAG_ERR_CREATE",
            StatusCode::ErrDuplicate => "PLCTAG_ERR_DUPLICATE",
            StatusCode::ErrEncode => "PLCTAG_ERR_ENCODE",
            StatusCode::ErrMutexDestroy => "PLCTAG_ERR_MUTEX_DESTROY",
            StatusCode::ErrMutexInit => "PLCTAG_ERR_MUTEX_INIT",
            StatusCode::ErrMutexLock => "PLCTAG_ERR_MUTEX_LOCK",
            StatusCode::ErrMutexUnlock => "PLCTAG_ERR_MUTEX_UNLOCK",
            StatusCode::ErrNotAllowed => "PLCTAG_ERR_NOT_ALLOWED",
            StatusCode::ErrNotFound => "PLCTAG_ERR_NOT_FOUND",
            StatusCode::ErrNotImplemented => "PLCTAG_ERR_NOT_IMPLEMENTED",
            StatusCode::ErrNoData => "PLCTAG_ERR_NO_DATA",
            StatusCode::ErrNoMatch => "PLCTAG_ERR_NO_MATCH",
            StatusCode::ErrNoMem => "PLCTAG_ERR_NO_MEM",
            StatusCode::ErrNoResources => "PLCTAG_ERR_NO_RESOURCES",
            StatusCode::ErrNullPtr => "PLCTAG_ERR_NULL_PTR",
            StatusCode::ErrOpen => "PLCTAG_ERR_OPEN",
            StatusCode::ErrOutOfBounds => "PLCTAG_ERR_OUT_OF_BOUNDS",
            StatusCode::ErrRead => "PLCTAG_ERR_READ",
            StatusCode::ErrRemoteErr => "PLCTAG_ERR_REMOTE_ERR",
            StatusCode::ErrThreadCreate => "PLCTAG_ERR_THREAD_CREATE",
            StatusCode::ErrThreadJoin => "PLCTAG_ERR_THREAD_JOIN",
            StatusCode::ErrTimeout => "PLCTAG_ERR_TIMEOUT",
            StatusCode::ErrTooLarge => "PLCTAG_ERR_TOO_LARGE",
            StatusCode::ErrTooSmall => "PLCTAG_ERR_TOO_SMALL",
            StatusCode::ErrUnsupported => "PLCTAG_ERR_UNSUPPORTED",
            StatusCode::ErrWinsock => "PLCTAG_ERR_WINSOCK",
            StatusCode::ErrWrite => "PLCTAG_ERR_WRITE",
            StatusCode::Unknown(_) => "PLCTAG_UNKNOWN",
        }
    }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self {
        StatusCode::from_code(code)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCode::Unknown(code) => write!(f, "PLCTAG_UNKNOWN({})", code),
            known => f.write_str(known.symbol()),
        }
    }
}
