//! Error types for PLC tag operations.

use std::io;
use thiserror::Error;

use crate::result::{Operation, OperationResult};
use crate::status::StatusCode;

/// Result type alias for tag operations.
pub type Result<T> = std::result::Result<T, PlcTagError>;

/// Errors that can occur while working with PLC tags.
#[derive(Debug, Error)]
pub enum PlcTagError {
    /// The communications engine reported an error status for an operation.
    #[error("{} Operation Error on tag '{}': {}", .result.operation, .result.tag_name, .result.status_text)]
    Operation {
        /// Full record of the failed operation.
        result: Box<OperationResult>,
    },

    /// Write attempted on a tag flagged read-only.
    #[error("Tag '{tag}' is set read only")]
    ReadOnly {
        /// Name of the tag.
        tag: String,
    },

    /// Value operation attempted before the tag was connected.
    #[error("Tag '{tag}' is not connected")]
    NotConnected {
        /// Name of the tag.
        tag: String,
    },

    /// Invalid parameter provided.
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Name of the invalid parameter.
        parameter: String,
        /// Description of why the parameter is invalid.
        reason: String,
    },

    /// Controller configuration is not usable.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A tag with the same name is already registered.
    #[error("Tag '{name}' already exists")]
    DuplicateTag {
        /// Name of the tag.
        name: String,
    },

    /// No tag with this name is registered.
    #[error("Tag '{name}' not found")]
    TagNotFound {
        /// Name of the tag.
        name: String,
    },

    /// A group with the same name already exists.
    #[error("Group '{name}' already exists")]
    DuplicateGroup {
        /// Name of the group.
        name: String,
    },

    /// The group name is reserved.
    #[error("Invalid group name '{name}'")]
    InvalidGroupName {
        /// Name of the group.
        name: String,
    },

    /// A registered tag holds a different value type than requested.
    #[error("Tag '{tag}' holds {actual} values, not {expected}")]
    TypeMismatch {
        /// Name of the tag.
        tag: String,
        /// Requested value type.
        expected: &'static str,
        /// Value type the tag was created with.
        actual: &'static str,
    },

    /// The libplctag shared library could not be loaded.
    #[error("libplctag not found (tried: {tried})")]
    LibraryNotFound {
        /// Library names or paths that were tried.
        tried: String,
    },

    /// A non-blocking operation did not complete within the controller timeout.
    #[error("{operation} on tag '{tag}' timed out")]
    Timeout {
        /// Name of the tag.
        tag: String,
        /// Operation that timed out.
        operation: Operation,
    },

    /// The engine refused to lock the tag's mutex.
    #[error("Lock of tag '{tag}' failed: {status}")]
    LockFailed {
        /// Name of the tag.
        tag: String,
        /// Status returned by the engine.
        status: StatusCode,
    },

    /// I/O error outside the engine (e.g. reachability probe).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PlcTagError {
    /// Creates a new `Operation` error from a finished result.
    pub fn operation(result: OperationResult) -> Self {
        Self::Operation {
            result: Box::new(result),
        }
    }

    /// Creates a new `InvalidParameter` error.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_plctag::PlcTagError;
    ///
    /// let err = PlcTagError::invalid_parameter("length", "must be at least 1");
    /// assert_eq!(err.to_string(), "Invalid parameter 'length': must be at least 1");
    /// ```
    pub fn invalid_parameter(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a new `NotConnected` error.
    pub fn not_connected(tag: impl Into<String>) -> Self {
        Self::NotConnected { tag: tag.into() }
    }

    /// Creates a new `TagNotFound` error.
    pub fn tag_not_found(name: impl Into<String>) -> Self {
        Self::TagNotFound { name: name.into() }
    }

    /// Returns the engine status carried by this error, if any.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_plctag::{PlcTagError, StatusCode};
    ///
    /// let err = PlcTagError::invalid_config("missing path");
    /// assert_eq!(err.status(), None);
    /// ```
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Operation { result } => Some(result.status),
            Self::Timeout { .. } => Some(StatusCode::ErrTimeout),
            Self::LockFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the operation result carried by this error, if any.
    pub fn result(&self) -> Option<&OperationResult> {
        match self {
            Self::Operation { result } => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        let mut result = OperationResult::start("Counter", Operation::Read);
        result.finish_with_text(StatusCode::ErrTimeout, "Timeout");
        let err = PlcTagError::operation(result);
        assert_eq!(
            err.to_string(),
            "Read Operation Error on tag 'Counter': Timeout"
        );
        assert_eq!(err.status(), Some(StatusCode::ErrTimeout));
        assert!(err.result().is_some());
    }

    #[test]
    fn test_read_only_display() {
        let err = PlcTagError::ReadOnly {
            tag: "Setpoint".to_string(),
        };
        assert_eq!(err.to_string(), "Tag 'Setpoint' is set read only");
    }

    #[test]
    fn test_invalid_config_display() {
        let err = PlcTagError::invalid_config("path is required");
        assert_eq!(err.to_string(), "Invalid configuration: path is required");
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = PlcTagError::TypeMismatch {
            tag: "Speed".to_string(),
            expected: "REAL",
            actual: "DINT",
        };
        assert_eq!(err.to_string(), "Tag 'Speed' holds DINT values, not REAL");
    }

    #[test]
    fn test_timeout_status() {
        let err = PlcTagError::Timeout {
            tag: "Speed".to_string(),
            operation: Operation::Read,
        };
        assert_eq!(err.to_string(), "Read on tag 'Speed' timed out");
        assert_eq!(err.status(), Some(StatusCode::ErrTimeout));
    }

    #[test]
    fn test_lock_failed_status() {
        let err = PlcTagError::LockFailed {
            tag: "Recipe".to_string(),
            status: StatusCode::ErrMutexLock,
        };
        assert_eq!(err.to_string(), "Lock of tag 'Recipe' failed: PLCTAG_ERR_MUTEX_LOCK");
        assert_eq!(err.status(), Some(StatusCode::ErrMutexLock));
    }
}
