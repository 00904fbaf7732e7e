//! In-memory tag engine for running without a PLC.
//!
//! [`MockPlc`] implements [`PlcTagApi`] over a simulated controller memory
//! keyed by tag name:
//!
//! - `create` parses `name`, `elem_size` and `elem_count` from the attribute
//!   string and allocates a local buffer of `elem_size * elem_count` bytes,
//! - `read` copies controller memory into the buffer, `write` copies it back,
//! - typed getters/setters work little-endian on the buffer, like the engine,
//!   and report `ErrOutOfBounds` (returning the engine's sentinel) outside it,
//! - failures (of create, read, write and typed getters) and non-blocking
//!   completion can be scripted per tag name.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ab_plctag::mock::MockPlc;
//! use ab_plctag::{ControllerConfig, CpuType, PlcController};
//!
//! let plc = Arc::new(MockPlc::new());
//! plc.set_memory("Counter", 42i32.to_le_bytes().to_vec());
//!
//! let controller = PlcController::new(
//!     ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx),
//!     plc.clone(),
//! )?;
//! let counter = controller.create_tag::<i32>("Counter")?;
//! counter.connect()?;
//! assert_eq!(counter.read()?, 42);
//!
//! counter.write(7)?;
//! assert_eq!(plc.memory("Counter"), Some(7i32.to_le_bytes().to_vec()));
//! # Ok::<(), ab_plctag::PlcTagError>(())
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::PlcTagApi;
use crate::attributes::attribute_value;
use crate::status::StatusCode;

const OK: i32 = 0;
const PENDING: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingOp {
    Read,
    Write,
}

#[derive(Debug)]
struct MockTag {
    name: String,
    attributes: String,
    buffer: Vec<u8>,
    status: i32,
    locked: bool,
    pending: Option<(PendingOp, u32)>,
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: i32,
    tags: HashMap<i32, MockTag>,
    memory: HashMap<String, Vec<u8>>,
    create_failures: HashMap<String, i32>,
    read_failures: HashMap<String, i32>,
    write_failures: HashMap<String, i32>,
    get_failures: HashMap<String, i32>,
    pending_polls: HashMap<String, u32>,
    reads: HashMap<String, usize>,
    writes: HashMap<String, usize>,
}

impl MockState {
    fn complete(&mut self, handle: i32, op: PendingOp) -> i32 {
        let Some(tag) = self.tags.get_mut(&handle) else {
            return StatusCode::ErrNotFound.code();
        };
        tag.pending = None;
        match op {
            PendingOp::Read => {
                let len = tag.buffer.len();
                let mut data = self.memory.get(&tag.name).cloned().unwrap_or_default();
                data.resize(len, 0);
                tag.buffer = data;
            }
            PendingOp::Write => {
                let stored = self.memory.entry(tag.name.clone()).or_default();
                if stored.len() < tag.buffer.len() {
                    stored.resize(tag.buffer.len(), 0);
                }
                stored[..tag.buffer.len()].copy_from_slice(&tag.buffer);
            }
        }
        tag.status = OK;
        OK
    }

    fn start(&mut self, handle: i32, op: PendingOp, timeout_ms: i32) -> i32 {
        let Some(tag) = self.tags.get(&handle) else {
            return StatusCode::ErrNotFound.code();
        };
        let name = tag.name.clone();
        let (failures, counts) = match op {
            PendingOp::Read => (&self.read_failures, &mut self.reads),
            PendingOp::Write => (&self.write_failures, &mut self.writes),
        };
        *counts.entry(name.clone()).or_default() += 1;

        if let Some(&code) = failures.get(&name) {
            if let Some(tag) = self.tags.get_mut(&handle) {
                tag.status = code;
            }
            return code;
        }

        let polls = self.pending_polls.get(&name).copied().unwrap_or(0);
        if timeout_ms == 0 && polls > 0 {
            if let Some(tag) = self.tags.get_mut(&handle) {
                tag.pending = Some((op, polls));
                tag.status = PENDING;
            }
            return PENDING;
        }
        self.complete(handle, op)
    }
}

/// Simulated tag engine backed by in-process memory.
#[derive(Debug, Default)]
pub struct MockPlc {
    state: Mutex<MockState>,
}

impl MockPlc {
    /// Creates an engine with empty controller memory.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 1,
                ..MockState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the controller memory behind a tag name.
    pub fn set_memory(&self, name: &str, bytes: Vec<u8>) {
        self.state().memory.insert(name.to_string(), bytes);
    }

    /// Returns the controller memory behind a tag name.
    pub fn memory(&self, name: &str) -> Option<Vec<u8>> {
        self.state().memory.get(name).cloned()
    }

    /// Makes `create` fail for a tag name with the given status.
    pub fn fail_create(&self, name: &str, status: StatusCode) {
        self.state().create_failures.insert(name.to_string(), status.code());
    }

    /// Makes `read` fail for a tag name with the given status.
    pub fn fail_read(&self, name: &str, status: StatusCode) {
        self.state().read_failures.insert(name.to_string(), status.code());
    }

    /// Makes `write` fail for a tag name with the given status.
    pub fn fail_write(&self, name: &str, status: StatusCode) {
        self.state().write_failures.insert(name.to_string(), status.code());
    }

    /// Makes every typed getter fail for a tag name with the given status.
    ///
    /// Reads still fill the buffer. The getters return the engine's
    /// sentinel and leave `status` set to the failure.
    pub fn fail_get(&self, name: &str, status: StatusCode) {
        self.state().get_failures.insert(name.to_string(), status.code());
    }

    /// Removes all scripted failures.
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.create_failures.clear();
        state.read_failures.clear();
        state.write_failures.clear();
        state.get_failures.clear();
    }

    /// Non-blocking reads/writes of this tag report `Pending` for `polls`
    /// status calls before completing.
    pub fn set_pending_polls(&self, name: &str, polls: u32) {
        self.state().pending_polls.insert(name.to_string(), polls);
    }

    /// Number of tags currently created and not destroyed.
    pub fn live_handles(&self) -> usize {
        self.state().tags.len()
    }

    /// Attribute string a handle was created with.
    pub fn attributes(&self, handle: i32) -> Option<String> {
        self.state().tags.get(&handle).map(|t| t.attributes.clone())
    }

    /// Returns whether the tag's engine-side mutex is held.
    pub fn is_locked(&self, handle: i32) -> bool {
        self.state().tags.get(&handle).is_some_and(|t| t.locked)
    }

    /// Number of read requests issued for a tag name.
    pub fn read_count(&self, name: &str) -> usize {
        self.state().reads.get(name).copied().unwrap_or(0)
    }

    /// Number of write requests issued for a tag name.
    pub fn write_count(&self, name: &str) -> usize {
        self.state().writes.get(name).copied().unwrap_or(0)
    }

    fn get<const N: usize>(&self, handle: i32, offset: i32) -> Option<[u8; N]> {
        let mut guard = self.state();
        let state = &mut *guard;
        let tag = state.tags.get_mut(&handle)?;
        if let Some(&code) = state.get_failures.get(&tag.name) {
            tag.status = code;
            return None;
        }
        let start = usize::try_from(offset).ok();
        match start.filter(|s| s + N <= tag.buffer.len()) {
            Some(start) => {
                let mut bytes = [0u8; N];
                bytes.copy_from_slice(&tag.buffer[start..start + N]);
                tag.status = OK;
                Some(bytes)
            }
            None => {
                tag.status = StatusCode::ErrOutOfBounds.code();
                None
            }
        }
    }

    fn set<const N: usize>(&self, handle: i32, offset: i32, bytes: [u8; N]) -> i32 {
        let mut state = self.state();
        let Some(tag) = state.tags.get_mut(&handle) else {
            return StatusCode::ErrNotFound.code();
        };
        let start = usize::try_from(offset).ok();
        match start.filter(|s| s + N <= tag.buffer.len()) {
            Some(start) => {
                tag.buffer[start..start + N].copy_from_slice(&bytes);
                tag.status = OK;
                OK
            }
            None => {
                tag.status = StatusCode::ErrOutOfBounds.code();
                tag.status
            }
        }
    }
}

fn parse_usize(attributes: &str, key: &str) -> Option<usize> {
    attribute_value(attributes, key).and_then(|v| v.parse().ok())
}

impl PlcTagApi for MockPlc {
    fn create(&self, attributes: &str, _timeout_ms: i32) -> i32 {
        let name = match attribute_value(attributes, "name") {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return StatusCode::ErrBadParam.code(),
        };
        let Some(elem_size) = parse_usize(attributes, "elem_size") else {
            return StatusCode::ErrBadParam.code();
        };
        let elem_count = parse_usize(attributes, "elem_count").unwrap_or(1);

        let mut state = self.state();
        if let Some(&code) = state.create_failures.get(&name) {
            return code;
        }

        let len = elem_size * elem_count;
        let mut buffer = state.memory.get(&name).cloned().unwrap_or_default();
        buffer.resize(len, 0);

        let handle = state.next_handle.max(1);
        state.next_handle = handle + 1;
        state.tags.insert(
            handle,
            MockTag {
                name,
                attributes: attributes.to_string(),
                buffer,
                status: OK,
                locked: false,
                pending: None,
            },
        );
        handle
    }

    fn destroy(&self, handle: i32) -> i32 {
        match self.state().tags.remove(&handle) {
            Some(_) => OK,
            None => StatusCode::ErrNotFound.code(),
        }
    }

    fn read(&self, handle: i32, timeout_ms: i32) -> i32 {
        self.state().start(handle, PendingOp::Read, timeout_ms)
    }

    fn write(&self, handle: i32, timeout_ms: i32) -> i32 {
        self.state().start(handle, PendingOp::Write, timeout_ms)
    }

    fn status(&self, handle: i32) -> i32 {
        let mut state = self.state();
        let Some(tag) = state.tags.get_mut(&handle) else {
            return StatusCode::ErrNotFound.code();
        };
        let status = tag.status;
        match tag.pending {
            Some((op, remaining)) if remaining > 0 => {
                tag.pending = Some((op, remaining - 1));
                PENDING
            }
            Some((op, _)) => state.complete(handle, op),
            None => status,
        }
    }

    fn abort(&self, handle: i32) -> i32 {
        let mut state = self.state();
        let Some(tag) = state.tags.get_mut(&handle) else {
            return StatusCode::ErrNotFound.code();
        };
        if tag.pending.take().is_some() {
            tag.status = StatusCode::ErrAbort.code();
        }
        OK
    }

    fn size(&self, handle: i32) -> i32 {
        match self.state().tags.get(&handle) {
            Some(tag) => i32::try_from(tag.buffer.len()).unwrap_or(i32::MAX),
            None => StatusCode::ErrNotFound.code(),
        }
    }

    fn lock(&self, handle: i32) -> i32 {
        let mut state = self.state();
        match state.tags.get_mut(&handle) {
            Some(tag) if tag.locked => StatusCode::ErrMutexLock.code(),
            Some(tag) => {
                tag.locked = true;
                OK
            }
            None => StatusCode::ErrNotFound.code(),
        }
    }

    fn unlock(&self, handle: i32) -> i32 {
        let mut state = self.state();
        match state.tags.get_mut(&handle) {
            Some(tag) if tag.locked => {
                tag.locked = false;
                OK
            }
            Some(_) => StatusCode::ErrMutexUnlock.code(),
            None => StatusCode::ErrNotFound.code(),
        }
    }

    fn decode_error(&self, code: i32) -> String {
        StatusCode::from_code(code).description().to_string()
    }

    fn get_u8(&self, handle: i32, offset: i32) -> u8 {
        self.get(handle, offset).map(u8::from_le_bytes).unwrap_or(u8::MAX)
    }

    fn set_u8(&self, handle: i32, offset: i32, value: u8) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_i8(&self, handle: i32, offset: i32) -> i8 {
        self.get(handle, offset).map(i8::from_le_bytes).unwrap_or(i8::MIN)
    }

    fn set_i8(&self, handle: i32, offset: i32, value: i8) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_u16(&self, handle: i32, offset: i32) -> u16 {
        self.get(handle, offset).map(u16::from_le_bytes).unwrap_or(u16::MAX)
    }

    fn set_u16(&self, handle: i32, offset: i32, value: u16) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_i16(&self, handle: i32, offset: i32) -> i16 {
        self.get(handle, offset).map(i16::from_le_bytes).unwrap_or(i16::MIN)
    }

    fn set_i16(&self, handle: i32, offset: i32, value: i16) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_u32(&self, handle: i32, offset: i32) -> u32 {
        self.get(handle, offset).map(u32::from_le_bytes).unwrap_or(u32::MAX)
    }

    fn set_u32(&self, handle: i32, offset: i32, value: u32) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_i32(&self, handle: i32, offset: i32) -> i32 {
        self.get(handle, offset).map(i32::from_le_bytes).unwrap_or(i32::MIN)
    }

    fn set_i32(&self, handle: i32, offset: i32, value: i32) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_u64(&self, handle: i32, offset: i32) -> u64 {
        self.get(handle, offset).map(u64::from_le_bytes).unwrap_or(u64::MAX)
    }

    fn set_u64(&self, handle: i32, offset: i32, value: u64) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_i64(&self, handle: i32, offset: i32) -> i64 {
        self.get(handle, offset).map(i64::from_le_bytes).unwrap_or(i64::MIN)
    }

    fn set_i64(&self, handle: i32, offset: i32, value: i64) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_f32(&self, handle: i32, offset: i32) -> f32 {
        self.get(handle, offset).map(f32::from_le_bytes).unwrap_or(f32::MIN)
    }

    fn set_f32(&self, handle: i32, offset: i32, value: f32) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }

    fn get_f64(&self, handle: i32, offset: i32) -> f64 {
        self.get(handle, offset).map(f64::from_le_bytes).unwrap_or(f64::MIN)
    }

    fn set_f64(&self, handle: i32, offset: i32, value: f64) -> i32 {
        self.set(handle, offset, value.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DINT: &str = "protocol=ab_eip&gateway=127.0.0.1&cpu=lgx&elem_size=4&elem_count=2&name=Pair";

    #[test]
    fn test_create_allocates_buffer() {
        let plc = MockPlc::new();
        let handle = plc.create(DINT, 1000);
        assert!(handle > 0);
        assert_eq!(plc.size(handle), 8);
        assert_eq!(plc.live_handles(), 1);
        assert_eq!(plc.attributes(handle).as_deref(), Some(DINT));
    }

    #[test]
    fn test_create_rejects_missing_name() {
        let plc = MockPlc::new();
        let code = plc.create("protocol=ab_eip&elem_size=4", 1000);
        assert_eq!(code, StatusCode::ErrBadParam.code());
    }

    #[test]
    fn test_handles_are_distinct() {
        let plc = MockPlc::new();
        let a = plc.create(DINT, 1000);
        let b = plc.create(DINT, 1000);
        assert_ne!(a, b);
        assert_eq!(plc.destroy(a), OK);
        assert_eq!(plc.destroy(a), StatusCode::ErrNotFound.code());
        assert_eq!(plc.live_handles(), 1);
    }

    #[test]
    fn test_read_copies_memory_little_endian() {
        let plc = MockPlc::new();
        plc.set_memory("Pair", hex::decode("2a000000feffffff").unwrap());
        let handle = plc.create(DINT, 1000);
        assert_eq!(plc.read(handle, 1000), OK);
        assert_eq!(plc.get_i32(handle, 0), 42);
        assert_eq!(plc.get_i32(handle, 4), -2);
        assert_eq!(plc.read_count("Pair"), 1);
    }

    #[test]
    fn test_write_copies_buffer() {
        let plc = MockPlc::new();
        let handle = plc.create(DINT, 1000);
        assert_eq!(plc.set_u16(handle, 0, 0x1234), OK);
        assert_eq!(plc.write(handle, 1000), OK);
        assert_eq!(
            plc.memory("Pair").map(hex::encode),
            Some("3412000000000000".to_string())
        );
    }

    #[test]
    fn test_out_of_bounds_sets_status() {
        let plc = MockPlc::new();
        let handle = plc.create(DINT, 1000);
        assert_eq!(plc.get_u32(handle, 6), u32::MAX);
        assert_eq!(plc.status(handle), StatusCode::ErrOutOfBounds.code());
        assert_eq!(plc.get_u32(handle, 4), 0);
        assert_eq!(plc.status(handle), OK);
        assert_eq!(plc.set_i64(handle, 4, 1), StatusCode::ErrOutOfBounds.code());
        assert_eq!(plc.get_i8(handle, -1), i8::MIN);
    }

    #[test]
    fn test_scripted_failures() {
        let plc = MockPlc::new();
        plc.fail_create("Missing", StatusCode::ErrNotFound);
        let code = plc.create(
            "protocol=ab_eip&cpu=lgx&elem_size=4&elem_count=1&name=Missing",
            1000,
        );
        assert_eq!(code, StatusCode::ErrNotFound.code());

        let handle = plc.create(DINT, 1000);
        plc.fail_read("Pair", StatusCode::ErrTimeout);
        assert_eq!(plc.read(handle, 1000), StatusCode::ErrTimeout.code());
        assert_eq!(plc.status(handle), StatusCode::ErrTimeout.code());

        plc.clear_failures();
        assert_eq!(plc.read(handle, 1000), OK);
    }

    #[test]
    fn test_scripted_get_failure() {
        let plc = MockPlc::new();
        plc.set_memory("Pair", hex::decode("2a00000000000000").unwrap());
        let handle = plc.create(DINT, 1000);
        plc.fail_get("Pair", StatusCode::ErrBadData);

        assert_eq!(plc.read(handle, 1000), OK);
        assert_eq!(plc.get_i32(handle, 0), i32::MIN);
        assert_eq!(plc.status(handle), StatusCode::ErrBadData.code());

        plc.clear_failures();
        assert_eq!(plc.get_i32(handle, 0), 42);
        assert_eq!(plc.status(handle), OK);
    }

    #[test]
    fn test_pending_then_complete() {
        let plc = MockPlc::new();
        plc.set_memory("Pair", vec![9, 0, 0, 0, 0, 0, 0, 0]);
        plc.set_pending_polls("Pair", 2);
        let handle = plc.create(DINT, 1000);

        assert_eq!(plc.read(handle, 0), PENDING);
        assert_eq!(plc.status(handle), PENDING);
        assert_eq!(plc.status(handle), PENDING);
        assert_eq!(plc.status(handle), OK);
        assert_eq!(plc.get_i32(handle, 0), 9);
    }

    #[test]
    fn test_abort_pending() {
        let plc = MockPlc::new();
        plc.set_pending_polls("Pair", 5);
        let handle = plc.create(DINT, 1000);
        assert_eq!(plc.write(handle, 0), PENDING);
        assert_eq!(plc.abort(handle), OK);
        assert_eq!(plc.status(handle), StatusCode::ErrAbort.code());
        assert_eq!(plc.memory("Pair"), None);
    }

    #[test]
    fn test_lock_unlock() {
        let plc = MockPlc::new();
        let handle = plc.create(DINT, 1000);
        assert_eq!(plc.lock(handle), OK);
        assert!(plc.is_locked(handle));
        assert_eq!(plc.lock(handle), StatusCode::ErrMutexLock.code());
        assert_eq!(plc.unlock(handle), OK);
        assert_eq!(plc.unlock(handle), StatusCode::ErrMutexUnlock.code());
        assert!(!plc.is_locked(handle));
    }
}
