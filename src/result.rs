//! Records of individual engine operations.
//!
//! Every engine call made on behalf of a tag is timed and captured in an
//! [`OperationResult`]: which tag, which operation, when it started, how
//! long it took and the status the engine reported.

use std::time::{Duration, Instant};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::api::PlcTagApi;
use crate::status::StatusCode;

/// Kind of engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Tag creation (connect).
    Create,
    /// Transfer from the PLC into the local buffer.
    Read,
    /// Decoding values out of the local buffer.
    ReadValue,
    /// Transfer from the local buffer to the PLC.
    Write,
    /// Encoding values into the local buffer.
    WriteValue,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Operation::Create => "Create",
            Operation::Read => "Read",
            Operation::ReadValue => "ReadValue",
            Operation::Write => "Write",
            Operation::WriteValue => "WriteValue",
        })
    }
}

/// Outcome of one engine operation on a tag.
#[derive(Debug, Clone)]
pub struct OperationResult {
    /// Name of the tag.
    pub tag_name: String,
    /// Operation performed.
    pub operation: Operation,
    /// UTC time the operation started.
    pub timestamp: OffsetDateTime,
    /// Time spent in the operation.
    pub execution_time: Duration,
    /// Final status. `Pending` until finished.
    pub status: StatusCode,
    /// Text for `status`.
    pub status_text: String,
    started: Instant,
}

impl OperationResult {
    /// Starts timing an operation.
    pub fn start(tag_name: impl Into<String>, operation: Operation) -> Self {
        Self {
            tag_name: tag_name.into(),
            operation,
            timestamp: OffsetDateTime::now_utc(),
            execution_time: Duration::ZERO,
            status: StatusCode::Pending,
            status_text: StatusCode::Pending.description().to_string(),
            started: Instant::now(),
        }
    }

    /// Stops timing and records the status, decoded by the engine.
    pub fn finish(&mut self, status: impl Into<StatusCode>, api: &dyn PlcTagApi) {
        let status = status.into();
        let text = api.decode_error(status.code());
        self.finish_with_text(status, text);
    }

    /// Stops timing and records the status with the given text.
    pub fn finish_with_text(&mut self, status: StatusCode, text: impl Into<String>) {
        self.execution_time = self.started.elapsed();
        self.status = status;
        self.status_text = text.into();
    }

    /// Determines if the result represents an error.
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let timestamp = self.timestamp.format(&Rfc3339).map_err(|_| std::fmt::Error)?;
        writeln!(f, "Tag Name:       {}", self.tag_name)?;
        writeln!(f, "Operation:      {}", self.operation)?;
        writeln!(f, "Timestamp:      {}", timestamp)?;
        writeln!(f, "ExecutionTime:  {}", self.execution_time.as_millis())?;
        writeln!(f, "StatusCode:     {}", self.status)?;
        write!(f, "StatusCodeText: {}", self.status_text)
    }
}
