//! Typed PLC tags.
//!
//! A [`Tag<T>`] is one named PLC variable of `length` elements of type `T`.
//! It is created by a [`PlcController`](crate::PlcController), connected to
//! the engine with [`Tag::connect`], then read and written.
//!
//! # Operations
//!
//! Every read is two engine steps and every write is two in the other
//! direction, each recorded as an [`OperationResult`]:
//!
//! | Call | Steps |
//! |------|-------|
//! | [`Tag::read`], [`Tag::read_array`] | `Read` (PLC to buffer), `ReadValue` (decode) |
//! | [`Tag::write`], [`Tag::write_array`] | `WriteValue` (encode), `Write` (buffer to PLC) |
//! | [`Tag::set_value`], [`Tag::set_values`] | `WriteValue` |
//! | [`Tag::flush`] | `Write` |
//!
//! A failed step returns [`PlcTagError::Operation`] with the full result.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ab_plctag::mock::MockPlc;
//! use ab_plctag::{ControllerConfig, CpuType, PlcController};
//!
//! let plc = Arc::new(MockPlc::new());
//! let controller = PlcController::new(
//!     ControllerConfig::new("10.0.0.5", "1,0", CpuType::Lgx),
//!     plc.clone(),
//! )?;
//!
//! let levels = controller.create_tag_array::<i16>("Levels", 3)?;
//! levels.connect()?;
//! levels.write_array(&[10, 20, 30])?;
//! assert_eq!(levels.read_array()?, vec![10, 20, 30]);
//! assert_eq!(levels.get_at(1)?, 20);
//! # Ok::<(), ab_plctag::PlcTagError>(())
//! ```

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::PlcTagApi;
use crate::attributes::TagAttributes;
use crate::controller::ControllerContext;
use crate::error::{PlcTagError, Result};
use crate::result::{Operation, OperationResult};
use crate::status::StatusCode;
use crate::value::TagValue;

#[cfg(feature = "async")]
const POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(10);

type ChangeListener = Arc<dyn Fn(&OperationResult) + Send + Sync>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A PLC tag holding `length` values of type `T`.
pub struct Tag<T: TagValue> {
    name: String,
    length: usize,
    ctx: Arc<ControllerContext>,
    handle: AtomicI32,
    read_only: AtomicBool,
    has_been_read: AtomicBool,
    has_been_written: AtomicBool,
    changed: AtomicBool,
    values: Mutex<Option<Vec<T>>>,
    last_result: Mutex<Option<OperationResult>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl<T: TagValue> Tag<T> {
    pub(crate) fn new(name: &str, length: usize, ctx: Arc<ControllerContext>) -> Self {
        Self {
            name: name.to_string(),
            length,
            ctx,
            handle: AtomicI32::new(0),
            read_only: AtomicBool::new(false),
            has_been_read: AtomicBool::new(false),
            has_been_written: AtomicBool::new(false),
            changed: AtomicBool::new(false),
            values: Mutex::new(None),
            last_result: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn api(&self) -> &dyn PlcTagApi {
        self.ctx.api.as_ref()
    }

    /// Tag name as known by the PLC.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of elements.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        T::ELEMENT_SIZE
    }

    /// PLC type name of the elements.
    pub fn value_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    /// Returns whether the tag has more than one element.
    pub fn is_array(&self) -> bool {
        self.length > 1
    }

    /// Engine handle, 0 when not connected.
    pub fn handle(&self) -> i32 {
        self.handle.load(Ordering::Acquire)
    }

    /// Returns whether the tag holds an engine handle.
    pub fn is_connected(&self) -> bool {
        self.handle() != 0
    }

    /// Returns whether writes are refused.
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Relaxed)
    }

    /// Marks the tag read-only or writable.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }

    /// Returns whether a read has succeeded at least once.
    pub fn has_been_read(&self) -> bool {
        self.has_been_read.load(Ordering::Relaxed)
    }

    /// Returns whether a write has succeeded at least once.
    pub fn has_been_written(&self) -> bool {
        self.has_been_written.load(Ordering::Relaxed)
    }

    /// Returns whether the last successful read changed the values.
    pub fn has_changed_value(&self) -> bool {
        self.changed.load(Ordering::Relaxed)
    }

    /// Attribute string the tag connects with, from the current controller
    /// settings.
    pub fn attributes(&self) -> TagAttributes {
        TagAttributes::new(
            self.ctx.gateway.clone(),
            self.ctx.cpu,
            self.name.clone(),
            T::ELEMENT_SIZE,
            self.length,
        )
        .with_path(self.ctx.path.clone())
        .with_debug_level(self.ctx.debug_level())
        .with_share_session(self.ctx.share_session)
    }

    /// Creates the tag in the engine. Does nothing when already connected.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::Operation`] with operation `Create` when the
    /// engine rejects the tag.
    pub fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let attributes = self.attributes().to_string();
        let mut result = OperationResult::start(&self.name, Operation::Create);
        let code = self.api().create(&attributes, self.ctx.timeout_ms());

        if code < 0 {
            return Err(self.fail(result, code));
        }
        result.finish(StatusCode::Ok, self.api());
        self.record(result);

        if self
            .handle
            .compare_exchange(0, code, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Another thread connected first.
            self.api().destroy(code);
            return Ok(());
        }
        tracing::debug!(tag = %self.name, handle = code, attributes = %attributes, "tag connected");
        Ok(())
    }

    /// Destroys the engine handle. Does nothing when not connected.
    pub fn disconnect(&self) {
        let handle = self.handle.swap(0, Ordering::AcqRel);
        if handle != 0 {
            let status = StatusCode::from_code(self.api().destroy(handle));
            if status.is_error() {
                tracing::warn!(tag = %self.name, handle, %status, "destroy failed");
            } else {
                tracing::debug!(tag = %self.name, handle, "tag disconnected");
            }
        }
    }

    fn connected_handle(&self) -> Result<i32> {
        match self.handle() {
            0 => Err(PlcTagError::not_connected(&self.name)),
            handle => Ok(handle),
        }
    }

    fn offset(&self, index: usize) -> i32 {
        i32::try_from(index * T::ELEMENT_SIZE).unwrap_or(i32::MAX)
    }

    fn record(&self, result: OperationResult) {
        *locked(&self.last_result) = Some(result);
    }

    fn record_failure(&self, result: OperationResult) -> PlcTagError {
        tracing::warn!(
            tag = %self.name,
            operation = %result.operation,
            status = %result.status,
            "operation failed"
        );
        self.record(result.clone());
        PlcTagError::operation(result)
    }

    fn fail(&self, mut result: OperationResult, status: impl Into<StatusCode>) -> PlcTagError {
        result.finish(status, self.api());
        self.record_failure(result)
    }

    /// Records a finished result and turns an error status into an error.
    fn complete(&self, mut result: OperationResult, status: StatusCode) -> Result<OperationResult> {
        if status.is_error() {
            return Err(self.fail(result, status));
        }
        result.finish(status, self.api());
        tracing::debug!(
            tag = %self.name,
            operation = %result.operation,
            elapsed_us = result.execution_time.as_micros() as u64,
            "operation complete"
        );
        self.record(result.clone());
        Ok(result)
    }

    fn transfer(&self, handle: i32, operation: Operation) -> Result<OperationResult> {
        let result = OperationResult::start(&self.name, operation);
        let timeout = self.ctx.timeout_ms();
        let code = match operation {
            Operation::Write => self.api().write(handle, timeout),
            _ => self.api().read(handle, timeout),
        };
        self.complete(result, StatusCode::from_code(code))
    }

    fn decode_values(&self, handle: i32) -> Result<(Vec<T>, OperationResult)> {
        let result = OperationResult::start(&self.name, Operation::ReadValue);
        let mut values = Vec::with_capacity(self.length);
        let mut status = StatusCode::Ok;
        for index in 0..self.length {
            match T::decode(self.api(), handle, self.offset(index)) {
                Ok(value) => values.push(value),
                Err(err) => {
                    status = err;
                    break;
                }
            }
        }
        let result = self.complete(result, status)?;
        Ok((values, result))
    }

    fn encode_values(&self, handle: i32, values: &[T]) -> Result<OperationResult> {
        if values.is_empty() || values.len() > self.length {
            return Err(PlcTagError::invalid_parameter(
                "values",
                format!("expected 1 to {} values, got {}", self.length, values.len()),
            ));
        }
        let result = OperationResult::start(&self.name, Operation::WriteValue);
        let status = values
            .iter()
            .enumerate()
            .map(|(index, value)| value.encode(self.api(), handle, self.offset(index)))
            .find(|status| status.is_error())
            .unwrap_or(StatusCode::Ok);
        self.complete(result, status)
    }

    /// Stores freshly decoded values and notifies listeners on change.
    /// Returns whether the values changed.
    fn accept(&self, values: &[T], result: &OperationResult) -> bool {
        let changed = {
            let mut last = locked(&self.values);
            let changed = last.as_deref() != Some(values);
            *last = Some(values.to_vec());
            changed
        };
        self.has_been_read.store(true, Ordering::Relaxed);
        self.changed.store(changed, Ordering::Relaxed);
        if changed {
            // Listeners may register more listeners, so call them unlocked.
            let listeners = locked(&self.listeners).clone();
            for listener in &listeners {
                listener(result);
            }
        }
        changed
    }

    fn refresh_values(&self) -> Result<(Vec<T>, OperationResult, bool)> {
        let handle = self.connected_handle()?;
        self.transfer(handle, Operation::Read)?;
        let (values, result) = self.decode_values(handle)?;
        let changed = self.accept(&values, &result);
        Ok((values, result, changed))
    }

    fn first(&self, values: Vec<T>) -> Result<T> {
        values
            .into_iter()
            .next()
            .ok_or_else(|| PlcTagError::invalid_parameter("length", "tag has no elements"))
    }

    /// Reads the tag from the PLC and returns element 0.
    ///
    /// # Errors
    ///
    /// - [`PlcTagError::NotConnected`] before [`connect`](Self::connect)
    /// - [`PlcTagError::Operation`] when the `Read` or `ReadValue` step fails
    pub fn read(&self) -> Result<T> {
        let values = self.read_array()?;
        self.first(values)
    }

    /// Reads the tag from the PLC and returns all elements.
    pub fn read_array(&self) -> Result<Vec<T>> {
        self.refresh_values().map(|(values, _, _)| values)
    }

    /// Writes `value` to element 0 and sends the buffer to the PLC.
    ///
    /// # Errors
    ///
    /// - [`PlcTagError::ReadOnly`] for a read-only tag
    /// - [`PlcTagError::NotConnected`] before [`connect`](Self::connect)
    /// - [`PlcTagError::Operation`] when the `WriteValue` or `Write` step fails
    pub fn write(&self, value: T) -> Result<()> {
        self.write_array(std::slice::from_ref(&value))
    }

    /// Writes up to `length` values from element 0 and sends the buffer.
    pub fn write_array(&self, values: &[T]) -> Result<()> {
        self.set_values(values)?;
        self.flush()
    }

    /// Encodes `value` into element 0 of the local buffer without sending it.
    pub fn set_value(&self, value: T) -> Result<()> {
        self.set_values(std::slice::from_ref(&value))
    }

    /// Encodes values into the local buffer without sending them.
    pub fn set_values(&self, values: &[T]) -> Result<()> {
        if self.is_read_only() {
            return Err(PlcTagError::ReadOnly {
                tag: self.name.clone(),
            });
        }
        let handle = self.connected_handle()?;
        self.encode_values(handle, values).map(|_| ())
    }

    fn flush_buffer(&self) -> Result<OperationResult> {
        if self.is_read_only() {
            return Err(PlcTagError::ReadOnly {
                tag: self.name.clone(),
            });
        }
        let handle = self.connected_handle()?;
        let result = self.transfer(handle, Operation::Write)?;
        self.has_been_written.store(true, Ordering::Relaxed);
        Ok(result)
    }

    /// Sends the local buffer to the PLC.
    pub fn flush(&self) -> Result<()> {
        self.flush_buffer().map(|_| ())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.length {
            return Err(PlcTagError::invalid_parameter(
                "index",
                format!("{} is out of range for {} elements", index, self.length),
            ));
        }
        Ok(())
    }

    /// Decodes element `index` from the local buffer without reading the PLC.
    pub fn get_at(&self, index: usize) -> Result<T> {
        self.check_index(index)?;
        let handle = self.connected_handle()?;
        let result = OperationResult::start(&self.name, Operation::ReadValue);
        match T::decode(self.api(), handle, self.offset(index)) {
            Ok(value) => {
                self.complete(result, StatusCode::Ok)?;
                Ok(value)
            }
            Err(status) => Err(self.fail(result, status)),
        }
    }

    /// Encodes `value` into element `index` of the local buffer.
    pub fn set_at(&self, index: usize, value: T) -> Result<()> {
        self.check_index(index)?;
        if self.is_read_only() {
            return Err(PlcTagError::ReadOnly {
                tag: self.name.clone(),
            });
        }
        let handle = self.connected_handle()?;
        let result = OperationResult::start(&self.name, Operation::WriteValue);
        let status = value.encode(self.api(), handle, self.offset(index));
        self.complete(result, status).map(|_| ())
    }

    fn with_handle(&self, call: impl FnOnce(&dyn PlcTagApi, i32) -> i32) -> StatusCode {
        match self.handle() {
            0 => StatusCode::ErrNullPtr,
            handle => StatusCode::from_code(call(self.api(), handle)),
        }
    }

    /// Aborts any outstanding engine operation.
    pub fn abort(&self) -> StatusCode {
        self.with_handle(|api, handle| api.abort(handle))
    }

    /// Status of the last engine operation.
    pub fn status(&self) -> StatusCode {
        self.with_handle(|api, handle| api.status(handle))
    }

    /// Acquires the engine-side mutex of the tag.
    pub fn lock(&self) -> StatusCode {
        self.with_handle(|api, handle| api.lock(handle))
    }

    /// Releases the engine-side mutex of the tag.
    pub fn unlock(&self) -> StatusCode {
        self.with_handle(|api, handle| api.unlock(handle))
    }

    /// Buffer size reported by the engine, or a negative status.
    pub fn engine_size(&self) -> i32 {
        match self.handle() {
            0 => StatusCode::ErrNullPtr.code(),
            handle => self.api().size(handle),
        }
    }

    /// Locks the tag and returns a guard that unlocks it when dropped.
    ///
    /// # Example
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use ab_plctag::mock::MockPlc;
    /// # use ab_plctag::{ControllerConfig, CpuType, PlcController};
    /// # let controller = PlcController::new(
    /// #     ControllerConfig::new("10.0.0.5", "1,0", CpuType::Lgx),
    /// #     Arc::new(MockPlc::new()),
    /// # )?;
    /// let recipe = controller.create_tag_array::<i32>("Recipe", 4)?;
    /// recipe.connect()?;
    /// {
    ///     let _guard = recipe.lock_guard()?;
    ///     recipe.set_at(0, 1)?;
    ///     recipe.set_at(3, 4)?;
    ///     recipe.flush()?;
    /// }
    /// # Ok::<(), ab_plctag::PlcTagError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// - [`PlcTagError::NotConnected`] before [`connect`](Self::connect)
    /// - [`PlcTagError::LockFailed`] when the engine refuses the lock
    pub fn lock_guard(&self) -> Result<TagLockGuard<'_>> {
        let handle = self.connected_handle()?;
        let status = StatusCode::from_code(self.api().lock(handle));
        if status.is_error() {
            return Err(PlcTagError::LockFailed {
                tag: self.name.clone(),
                status,
            });
        }
        Ok(TagLockGuard {
            api: self.api(),
            handle,
        })
    }

    /// Values from the last successful read.
    pub fn last_values(&self) -> Option<Vec<T>> {
        locked(&self.values).clone()
    }

    /// Element 0 from the last successful read.
    pub fn last_value(&self) -> Option<T> {
        locked(&self.values)
            .as_ref()
            .and_then(|values| values.first().cloned())
    }

    /// Result of the last engine operation, successful or not.
    pub fn last_result(&self) -> Option<OperationResult> {
        locked(&self.last_result).clone()
    }

    /// Registers a listener called with the `ReadValue` result whenever a
    /// read returns values different from the previous read.
    pub fn on_changed(&self, listener: impl Fn(&OperationResult) + Send + Sync + 'static) {
        locked(&self.listeners).push(Arc::new(listener));
    }
}

#[cfg(feature = "async")]
impl<T: TagValue> Tag<T> {
    async fn transfer_async(&self, handle: i32, operation: Operation) -> Result<OperationResult> {
        let result = OperationResult::start(&self.name, operation);
        let deadline = tokio::time::Instant::now() + self.ctx.timeout();
        let code = match operation {
            Operation::Write => self.api().write(handle, 0),
            _ => self.api().read(handle, 0),
        };

        let mut status = StatusCode::from_code(code);
        while status.is_pending() {
            if tokio::time::Instant::now() >= deadline {
                self.api().abort(handle);
                tracing::warn!(tag = %self.name, %operation, "operation timed out");
                return Err(PlcTagError::Timeout {
                    tag: self.name.clone(),
                    operation,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            status = StatusCode::from_code(self.api().status(handle));
        }
        self.complete(result, status)
    }

    /// Reads the tag without blocking the runtime and returns all elements.
    ///
    /// Past the controller timeout the engine operation is aborted and
    /// [`PlcTagError::Timeout`] is returned.
    pub async fn read_array_async(&self) -> Result<Vec<T>> {
        let handle = self.connected_handle()?;
        self.transfer_async(handle, Operation::Read).await?;
        let (values, result) = self.decode_values(handle)?;
        self.accept(&values, &result);
        Ok(values)
    }

    /// Reads the tag without blocking the runtime and returns element 0.
    pub async fn read_async(&self) -> Result<T> {
        let values = self.read_array_async().await?;
        self.first(values)
    }

    /// Writes values without blocking the runtime.
    pub async fn write_array_async(&self, values: &[T]) -> Result<()> {
        self.set_values(values)?;
        let handle = self.connected_handle()?;
        self.transfer_async(handle, Operation::Write).await?;
        self.has_been_written.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Writes `value` to element 0 without blocking the runtime.
    pub async fn write_async(&self, value: T) -> Result<()> {
        self.write_array_async(std::slice::from_ref(&value)).await
    }
}

impl<T: TagValue> Drop for Tag<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl<T: TagValue> std::fmt::Debug for Tag<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tag")
            .field("name", &self.name)
            .field("value_type", &T::TYPE_NAME)
            .field("length", &self.length)
            .field("handle", &self.handle())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

/// Holds a tag's engine-side mutex until dropped.
#[must_use = "the tag is unlocked as soon as the guard is dropped"]
pub struct TagLockGuard<'a> {
    api: &'a dyn PlcTagApi,
    handle: i32,
}

impl Drop for TagLockGuard<'_> {
    fn drop(&mut self) {
        let status = StatusCode::from_code(self.api.unlock(self.handle));
        if status.is_error() {
            tracing::warn!(handle = self.handle, %status, "unlock failed");
        }
    }
}

/// A tag of any value type.
///
/// Groups and the controller registry hold tags through this trait. Use
/// [`PlcController::typed_tag`](crate::PlcController::typed_tag) to get the
/// typed [`Tag<T>`] back.
pub trait AnyTag: Send + Sync {
    /// Tag name.
    fn name(&self) -> &str;
    /// Size of one element in bytes.
    fn element_size(&self) -> usize;
    /// Number of elements.
    fn length(&self) -> usize;
    /// PLC type name of the elements.
    fn value_type(&self) -> &'static str;
    /// Engine handle, 0 when not connected.
    fn handle(&self) -> i32;
    /// Returns whether the tag holds an engine handle.
    fn is_connected(&self) -> bool;
    /// Returns whether the tag has more than one element.
    fn is_array(&self) -> bool;
    /// Returns whether writes are refused.
    fn is_read_only(&self) -> bool;
    /// Marks the tag read-only or writable.
    fn set_read_only(&self, read_only: bool);
    /// Creates the tag in the engine.
    fn connect(&self) -> Result<()>;
    /// Destroys the engine handle.
    fn disconnect(&self);
    /// Reads the tag and returns the outcome as a result record, with
    /// whether this read changed the values.
    fn refresh(&self) -> (OperationResult, bool);
    /// Sends the local buffer and returns the outcome as a result record.
    fn flush(&self) -> OperationResult;
    /// Returns whether the last successful read changed the values.
    fn has_changed_value(&self) -> bool;
    /// Returns whether a read has succeeded at least once.
    fn has_been_read(&self) -> bool;
    /// Returns whether a write has succeeded at least once.
    fn has_been_written(&self) -> bool;
    /// Aborts any outstanding engine operation.
    fn abort(&self) -> StatusCode;
    /// Status of the last engine operation.
    fn status(&self) -> StatusCode;
    /// Buffer size reported by the engine.
    fn engine_size(&self) -> i32;
    /// Acquires the engine-side mutex.
    fn lock(&self) -> StatusCode;
    /// Releases the engine-side mutex.
    fn unlock(&self) -> StatusCode;
    /// Result of the last engine operation.
    fn last_result(&self) -> Option<OperationResult>;
    /// Converts into `Any` for downcasting to [`Tag<T>`].
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: TagValue> Tag<T> {
    /// Turns an error into a result record for the untyped interface.
    fn outcome(&self, operation: Operation, outcome: Result<OperationResult>) -> OperationResult {
        match outcome {
            Ok(result) => result,
            Err(PlcTagError::Operation { result }) => *result,
            Err(err) => {
                let status = match &err {
                    PlcTagError::NotConnected { .. } => StatusCode::ErrNullPtr,
                    PlcTagError::ReadOnly { .. } => StatusCode::ErrNotAllowed,
                    other => other.status().unwrap_or(StatusCode::ErrBadParam),
                };
                let mut result = OperationResult::start(&self.name, operation);
                result.finish_with_text(status, err.to_string());
                result
            }
        }
    }
}

impl<T: TagValue> AnyTag for Tag<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn element_size(&self) -> usize {
        T::ELEMENT_SIZE
    }

    fn length(&self) -> usize {
        self.length
    }

    fn value_type(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn handle(&self) -> i32 {
        Tag::handle(self)
    }

    fn is_connected(&self) -> bool {
        Tag::is_connected(self)
    }

    fn is_array(&self) -> bool {
        Tag::is_array(self)
    }

    fn is_read_only(&self) -> bool {
        Tag::is_read_only(self)
    }

    fn set_read_only(&self, read_only: bool) {
        Tag::set_read_only(self, read_only)
    }

    fn connect(&self) -> Result<()> {
        Tag::connect(self)
    }

    fn disconnect(&self) {
        Tag::disconnect(self)
    }

    fn refresh(&self) -> (OperationResult, bool) {
        match self.refresh_values() {
            Ok((_, result, changed)) => (result, changed),
            Err(err) => (self.outcome(Operation::Read, Err(err)), false),
        }
    }

    fn flush(&self) -> OperationResult {
        let outcome = self.flush_buffer();
        self.outcome(Operation::Write, outcome)
    }

    fn has_changed_value(&self) -> bool {
        Tag::has_changed_value(self)
    }

    fn has_been_read(&self) -> bool {
        Tag::has_been_read(self)
    }

    fn has_been_written(&self) -> bool {
        Tag::has_been_written(self)
    }

    fn abort(&self) -> StatusCode {
        Tag::abort(self)
    }

    fn status(&self) -> StatusCode {
        Tag::status(self)
    }

    fn engine_size(&self) -> i32 {
        Tag::engine_size(self)
    }

    fn lock(&self) -> StatusCode {
        Tag::lock(self)
    }

    fn unlock(&self) -> StatusCode {
        Tag::unlock(self)
    }

    fn last_result(&self) -> Option<OperationResult> {
        Tag::last_result(self)
    }

    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerConfig;
    use crate::cpu::CpuType;
    use crate::mock::MockPlc;
    use std::sync::atomic::AtomicUsize;

    fn context(plc: &Arc<MockPlc>) -> Arc<ControllerContext> {
        let config = ControllerConfig::new("10.0.0.5", "1,0", CpuType::Lgx);
        Arc::new(ControllerContext::new(&config, plc.clone()))
    }

    fn connected<T: TagValue>(plc: &Arc<MockPlc>, name: &str, length: usize) -> Tag<T> {
        let tag = Tag::<T>::new(name, length, context(plc));
        tag.connect().unwrap();
        tag
    }

    #[test]
    fn test_attributes_follow_controller() {
        let plc = Arc::new(MockPlc::new());
        let tag = Tag::<f64>::new("Flow", 2, context(&plc));
        assert_eq!(
            tag.attributes().to_string(),
            "protocol=ab_eip&gateway=10.0.0.5&path=1,0&cpu=lgx&elem_size=8&elem_count=2&name=Flow&share_session=1"
        );
        assert!(tag.is_array());
        assert_eq!(tag.size(), 8);
        assert_eq!(tag.value_type(), "LREAL");
    }

    #[test]
    fn test_connect_is_idempotent() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<i32>(&plc, "Counter", 1);
        let handle = tag.handle();
        assert!(handle > 0);
        tag.connect().unwrap();
        assert_eq!(tag.handle(), handle);
        assert_eq!(plc.live_handles(), 1);
        assert_eq!(tag.last_result().unwrap().operation, Operation::Create);
    }

    #[test]
    fn test_connect_failure() {
        let plc = Arc::new(MockPlc::new());
        plc.fail_create("Ghost", StatusCode::ErrNotFound);
        let tag = Tag::<i32>::new("Ghost", 1, context(&plc));
        let err = tag.connect().unwrap_err();
        let result = err.result().unwrap();
        assert_eq!(result.operation, Operation::Create);
        assert_eq!(result.status, StatusCode::ErrNotFound);
        assert!(!tag.is_connected());
    }

    #[test]
    fn test_not_connected() {
        let plc = Arc::new(MockPlc::new());
        let tag = Tag::<i32>::new("Counter", 1, context(&plc));
        assert!(matches!(tag.read(), Err(PlcTagError::NotConnected { .. })));
        assert!(matches!(tag.write(1), Err(PlcTagError::NotConnected { .. })));
        assert_eq!(tag.status(), StatusCode::ErrNullPtr);
        assert_eq!(tag.abort(), StatusCode::ErrNullPtr);
        assert_eq!(tag.engine_size(), StatusCode::ErrNullPtr.code());
        assert_eq!(plc.read_count("Counter"), 0);
    }

    #[test]
    fn test_read_and_write() {
        let plc = Arc::new(MockPlc::new());
        plc.set_memory("Speed", 12.5f32.to_le_bytes().to_vec());
        let tag = connected::<f32>(&plc, "Speed", 1);

        assert_eq!(tag.read().unwrap(), 12.5);
        assert!(tag.has_been_read());
        assert_eq!(tag.last_value(), Some(12.5));
        assert_eq!(tag.last_result().unwrap().operation, Operation::ReadValue);

        tag.write(3.25).unwrap();
        assert!(tag.has_been_written());
        assert_eq!(plc.memory("Speed"), Some(3.25f32.to_le_bytes().to_vec()));
        assert_eq!(tag.last_result().unwrap().operation, Operation::Write);
    }

    #[test]
    fn test_read_failure_carries_result() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<i32>(&plc, "Counter", 1);
        plc.fail_read("Counter", StatusCode::ErrTimeout);
        let err = tag.read().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::ErrTimeout));
        assert_eq!(err.result().unwrap().operation, Operation::Read);
        assert_eq!(
            err.to_string(),
            "Read Operation Error on tag 'Counter': The operation timed out"
        );
        assert!(!tag.has_been_read());
    }

    #[test]
    fn test_write_failure() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<i32>(&plc, "Counter", 1);
        plc.fail_write("Counter", StatusCode::ErrBadConnection);
        let err = tag.write(5).unwrap_err();
        assert_eq!(err.result().unwrap().operation, Operation::Write);
        assert!(!tag.has_been_written());
    }

    #[test]
    fn test_read_only() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<i32>(&plc, "Setpoint", 1);
        tag.set_read_only(true);
        assert!(matches!(tag.write(1), Err(PlcTagError::ReadOnly { .. })));
        assert!(matches!(tag.flush(), Err(PlcTagError::ReadOnly { .. })));
        assert!(matches!(tag.set_at(0, 1), Err(PlcTagError::ReadOnly { .. })));
        assert_eq!(plc.write_count("Setpoint"), 0);
    }

    #[test]
    fn test_write_array_bounds() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<u16>(&plc, "Words", 2);
        assert!(tag.write_array(&[1, 2, 3]).is_err());
        assert!(tag.write_array(&[]).is_err());
        tag.write_array(&[0x0102, 0x0304]).unwrap();
        assert_eq!(
            plc.memory("Words").map(hex::encode),
            Some("02010403".to_string())
        );
    }

    #[test]
    fn test_indexed_access() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<i32>(&plc, "Recipe", 3);
        tag.set_at(2, -7).unwrap();
        assert_eq!(tag.get_at(2).unwrap(), -7);
        assert!(matches!(
            tag.get_at(3),
            Err(PlcTagError::InvalidParameter { .. })
        ));
        assert!(tag.set_at(3, 0).is_err());
        assert_eq!(plc.write_count("Recipe"), 0);
        tag.flush().unwrap();
        let memory = plc.memory("Recipe").unwrap();
        assert_eq!(&memory[8..], &(-7i32).to_le_bytes()[..]);
    }

    #[test]
    fn test_change_notification() {
        let plc = Arc::new(MockPlc::new());
        plc.set_memory("Counter", 1i32.to_le_bytes().to_vec());
        let tag = connected::<i32>(&plc, "Counter", 1);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        tag.on_changed(move |result| {
            assert_eq!(result.operation, Operation::ReadValue);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        tag.read().unwrap();
        assert!(tag.has_changed_value());
        tag.read().unwrap();
        assert!(!tag.has_changed_value());
        plc.set_memory("Counter", 2i32.to_le_bytes().to_vec());
        tag.read().unwrap();
        assert!(tag.has_changed_value());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_can_register_listeners_and_read() {
        let plc = Arc::new(MockPlc::new());
        plc.set_memory("Counter", 1i32.to_le_bytes().to_vec());
        let tag = Arc::new(connected::<i32>(&plc, "Counter", 1));
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let weak = Arc::downgrade(&tag);
        tag.on_changed(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            if let Some(tag) = weak.upgrade() {
                tag.on_changed(|_| {});
                assert_eq!(tag.read().unwrap(), tag.last_value().unwrap());
            }
        });

        tag.read().unwrap();
        plc.set_memory("Counter", 2i32.to_le_bytes().to_vec());
        tag.read().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(tag.listeners.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_lock_guard_errors() {
        let plc = Arc::new(MockPlc::new());
        let tag = Tag::<i32>::new("Counter", 1, context(&plc));
        assert!(matches!(
            tag.lock_guard(),
            Err(PlcTagError::NotConnected { .. })
        ));

        tag.connect().unwrap();
        assert_eq!(tag.lock(), StatusCode::Ok);
        match tag.lock_guard() {
            Err(PlcTagError::LockFailed { tag: name, status }) => {
                assert_eq!(name, "Counter");
                assert_eq!(status, StatusCode::ErrMutexLock);
            }
            other => panic!("expected lock failure, got {:?}", other.map(|_| ())),
        }
        assert_eq!(tag.unlock(), StatusCode::Ok);
    }

    #[test]
    fn test_lock_guard_unlocks() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<i32>(&plc, "Counter", 1);
        let handle = tag.handle();
        {
            let _guard = tag.lock_guard().unwrap();
            assert!(plc.is_locked(handle));
            assert_eq!(tag.lock(), StatusCode::ErrMutexLock);
        }
        assert!(!plc.is_locked(handle));
        assert_eq!(tag.unlock(), StatusCode::ErrMutexUnlock);
    }

    #[test]
    fn test_any_tag_refresh_and_flush() {
        let plc = Arc::new(MockPlc::new());
        let tag: Arc<dyn AnyTag> = Arc::new(Tag::<bool>::new("Run", 1, context(&plc)));
        let (result, changed) = tag.refresh();
        assert_eq!(result.status, StatusCode::ErrNullPtr);
        assert!(!changed);

        tag.connect().unwrap();
        let (result, changed) = tag.refresh();
        assert_eq!(result.status, StatusCode::Ok);
        assert!(changed);
        assert!(!tag.refresh().1);
        assert_eq!(tag.flush().operation, Operation::Write);

        tag.set_read_only(true);
        assert_eq!(tag.flush().status, StatusCode::ErrNotAllowed);
    }

    #[test]
    fn test_drop_destroys_handle() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<i32>(&plc, "Counter", 1);
        assert_eq!(plc.live_handles(), 1);
        drop(tag);
        assert_eq!(plc.live_handles(), 0);
    }

    #[test]
    fn test_disconnect() {
        let plc = Arc::new(MockPlc::new());
        let tag = connected::<i32>(&plc, "Counter", 1);
        tag.disconnect();
        assert!(!tag.is_connected());
        tag.disconnect();
        assert_eq!(plc.live_handles(), 0);
    }
}
