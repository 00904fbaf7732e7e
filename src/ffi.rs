//! Runtime bindings to the libplctag shared library.
//!
//! The library is loaded with `libloading` instead of being linked at build
//! time, so this crate builds (and its tests run) on machines without
//! libplctag installed. [`NativeLibrary::load`] searches, in order:
//!
//! 1. the file named by the `LIBPLCTAG_PATH` environment variable,
//! 2. the platform library names in [`LIB_NAMES`].
//!
//! The first successful load is cached for the life of the process.
//!
//! ## Wrapped Functions
//!
//! - `plc_tag_create` / `plc_tag_destroy`
//! - `plc_tag_read` / `plc_tag_write`
//! - `plc_tag_status` / `plc_tag_abort` / `plc_tag_get_size`
//! - `plc_tag_lock` / `plc_tag_unlock`
//! - `plc_tag_decode_error`
//! - `plc_tag_get_*` / `plc_tag_set_*` for 8/16/32/64-bit integers and 32/64-bit floats

use std::ffi::{c_char, c_int, CStr, CString, OsStr};
use std::sync::{Arc, OnceLock};

use libloading::Library;

use crate::api::PlcTagApi;
use crate::error::{PlcTagError, Result};
use crate::status::StatusCode;

/// Environment variable naming an explicit libplctag file.
pub const LIBRARY_PATH_ENV: &str = "LIBPLCTAG_PATH";

/// Library names to try on different platforms.
#[cfg(target_os = "linux")]
pub const LIB_NAMES: &[&str] = &["libplctag.so.2", "libplctag.so"];

/// Library names to try on different platforms.
#[cfg(target_os = "macos")]
pub const LIB_NAMES: &[&str] = &["libplctag.dylib", "libplctag.2.dylib"];

/// Library names to try on different platforms.
#[cfg(target_os = "windows")]
pub const LIB_NAMES: &[&str] = &["plctag.dll", "libplctag.dll"];

/// Library names to try on different platforms.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
pub const LIB_NAMES: &[&str] = &["libplctag.so"];

type CreateFn = unsafe extern "C" fn(*const c_char, c_int) -> i32;
type HandleFn = unsafe extern "C" fn(i32) -> c_int;
type IoFn = unsafe extern "C" fn(i32, c_int) -> c_int;
type DecodeFn = unsafe extern "C" fn(c_int) -> *const c_char;
type GetFn<T> = unsafe extern "C" fn(i32, c_int) -> T;
type SetFn<T> = unsafe extern "C" fn(i32, c_int, T) -> c_int;

/// Global library instance (loaded once).
static NATIVE: OnceLock<std::result::Result<Arc<NativeLibrary>, String>> = OnceLock::new();

/// Loaded libplctag library and its function pointers.
pub struct NativeLibrary {
    create: CreateFn,
    destroy: HandleFn,
    read: IoFn,
    write: IoFn,
    status: HandleFn,
    abort: HandleFn,
    get_size: HandleFn,
    lock: HandleFn,
    unlock: HandleFn,
    decode_error: DecodeFn,
    get_uint8: GetFn<u8>,
    set_uint8: SetFn<u8>,
    get_int8: GetFn<i8>,
    set_int8: SetFn<i8>,
    get_uint16: GetFn<u16>,
    set_uint16: SetFn<u16>,
    get_int16: GetFn<i16>,
    set_int16: SetFn<i16>,
    get_uint32: GetFn<u32>,
    set_uint32: SetFn<u32>,
    get_int32: GetFn<i32>,
    set_int32: SetFn<i32>,
    get_uint64: GetFn<u64>,
    set_uint64: SetFn<u64>,
    get_int64: GetFn<i64>,
    set_int64: SetFn<i64>,
    get_float32: GetFn<f32>,
    set_float32: SetFn<f32>,
    get_float64: GetFn<f64>,
    set_float64: SetFn<f64>,
    source: String,
    // Keeps the function pointers above valid.
    _lib: Library,
}

/// Copies a function pointer out of the library.
///
/// # Safety
///
/// `T` must match the C signature of `name`.
unsafe fn symbol<T: Copy>(lib: &Library, name: &[u8]) -> std::result::Result<T, libloading::Error> {
    lib.get::<T>(name).map(|s| *s)
}

impl NativeLibrary {
    /// Returns the process-wide library, loading it on first use.
    ///
    /// # Errors
    ///
    /// Returns `PlcTagError::LibraryNotFound` if no candidate could be loaded
    /// or a candidate lacks one of the required symbols.
    pub fn load() -> Result<Arc<Self>> {
        NATIVE
            .get_or_init(|| {
                let mut tried = Vec::new();
                for candidate in candidates() {
                    match Self::open(&candidate) {
                        Ok(lib) => {
                            tracing::info!("Loaded libplctag: {}", candidate);
                            return Ok(Arc::new(lib));
                        }
                        Err(e) => {
                            tracing::debug!("libplctag candidate {} failed: {}", candidate, e);
                            tried.push(candidate);
                        }
                    }
                }
                tracing::warn!("libplctag not found");
                Err(tried.join(", "))
            })
            .clone()
            .map_err(|tried| PlcTagError::LibraryNotFound { tried })
    }

    /// Loads libplctag from an explicit path, bypassing the process-wide cache.
    pub fn load_from(path: impl AsRef<OsStr>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        Self::open(path)
            .map(Arc::new)
            .map_err(|e| {
                tracing::warn!("Failed to load libplctag from {:?}: {}", path, e);
                PlcTagError::LibraryNotFound {
                    tried: path.to_string_lossy().into_owned(),
                }
            })
    }

    /// Returns the name or path the library was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn open(path: impl AsRef<OsStr>) -> std::result::Result<Self, libloading::Error> {
        let path = path.as_ref();
        // SAFETY: loading libplctag runs its initializers, which have no
        // preconditions. Every symbol type below matches libplctag.h.
        unsafe {
            let lib = Library::new(path)?;
            Ok(Self {
                create: symbol(&lib, b"plc_tag_create\0")?,
                destroy: symbol(&lib, b"plc_tag_destroy\0")?,
                read: symbol(&lib, b"plc_tag_read\0")?,
                write: symbol(&lib, b"plc_tag_write\0")?,
                status: symbol(&lib, b"plc_tag_status\0")?,
                abort: symbol(&lib, b"plc_tag_abort\0")?,
                get_size: symbol(&lib, b"plc_tag_get_size\0")?,
                lock: symbol(&lib, b"plc_tag_lock\0")?,
                unlock: symbol(&lib, b"plc_tag_unlock\0")?,
                decode_error: symbol(&lib, b"plc_tag_decode_error\0")?,
                get_uint8: symbol(&lib, b"plc_tag_get_uint8\0")?,
                set_uint8: symbol(&lib, b"plc_tag_set_uint8\0")?,
                get_int8: symbol(&lib, b"plc_tag_get_int8\0")?,
                set_int8: symbol(&lib, b"plc_tag_set_int8\0")?,
                get_uint16: symbol(&lib, b"plc_tag_get_uint16\0")?,
                set_uint16: symbol(&lib, b"plc_tag_set_uint16\0")?,
                get_int16: symbol(&lib, b"plc_tag_get_int16\0")?,
                set_int16: symbol(&lib, b"plc_tag_set_int16\0")?,
                get_uint32: symbol(&lib, b"plc_tag_get_uint32\0")?,
                set_uint32: symbol(&lib, b"plc_tag_set_uint32\0")?,
                get_int32: symbol(&lib, b"plc_tag_get_int32\0")?,
                set_int32: symbol(&lib, b"plc_tag_set_int32\0")?,
                get_uint64: symbol(&lib, b"plc_tag_get_uint64\0")?,
                set_uint64: symbol(&lib, b"plc_tag_set_uint64\0")?,
                get_int64: symbol(&lib, b"plc_tag_get_int64\0")?,
                set_int64: symbol(&lib, b"plc_tag_set_int64\0")?,
                get_float32: symbol(&lib, b"plc_tag_get_float32\0")?,
                set_float32: symbol(&lib, b"plc_tag_set_float32\0")?,
                get_float64: symbol(&lib, b"plc_tag_get_float64\0")?,
                set_float64: symbol(&lib, b"plc_tag_set_float64\0")?,
                source: path.to_string_lossy().into_owned(),
                _lib: lib,
            })
        }
    }
}

/// Library candidates in search order.
fn candidates() -> Vec<String> {
    let mut names = Vec::with_capacity(LIB_NAMES.len() + 1);
    if let Ok(path) = std::env::var(LIBRARY_PATH_ENV) {
        if !path.is_empty() {
            names.push(path);
        }
    }
    names.extend(LIB_NAMES.iter().map(|s| s.to_string()));
    names
}

// SAFETY (all calls below): libplctag validates handles itself and reports
// unknown ones through its return value; pointers passed in are valid
// NUL-terminated strings owned for the duration of the call.
impl PlcTagApi for NativeLibrary {
    fn create(&self, attributes: &str, timeout_ms: i32) -> i32 {
        let Ok(attributes) = CString::new(attributes) else {
            return StatusCode::ErrBadParam.code();
        };
        unsafe { (self.create)(attributes.as_ptr(), timeout_ms) }
    }

    fn destroy(&self, handle: i32) -> i32 {
        unsafe { (self.destroy)(handle) }
    }

    fn read(&self, handle: i32, timeout_ms: i32) -> i32 {
        unsafe { (self.read)(handle, timeout_ms) }
    }

    fn write(&self, handle: i32, timeout_ms: i32) -> i32 {
        unsafe { (self.write)(handle, timeout_ms) }
    }

    fn status(&self, handle: i32) -> i32 {
        unsafe { (self.status)(handle) }
    }

    fn abort(&self, handle: i32) -> i32 {
        unsafe { (self.abort)(handle) }
    }

    fn size(&self, handle: i32) -> i32 {
        unsafe { (self.get_size)(handle) }
    }

    fn lock(&self, handle: i32) -> i32 {
        unsafe { (self.lock)(handle) }
    }

    fn unlock(&self, handle: i32) -> i32 {
        unsafe { (self.unlock)(handle) }
    }

    fn decode_error(&self, code: i32) -> String {
        let text = unsafe { (self.decode_error)(code) };
        if text.is_null() {
            StatusCode::from_code(code).description().to_string()
        } else {
            // SAFETY: the engine returns pointers to static strings.
            unsafe { CStr::from_ptr(text).to_string_lossy().into_owned() }
        }
    }

    fn get_u8(&self, handle: i32, offset: i32) -> u8 {
        unsafe { (self.get_uint8)(handle, offset) }
    }

    fn set_u8(&self, handle: i32, offset: i32, value: u8) -> i32 {
        unsafe { (self.set_uint8)(handle, offset, value) }
    }

    fn get_i8(&self, handle: i32, offset: i32) -> i8 {
        unsafe { (self.get_int8)(handle, offset) }
    }

    fn set_i8(&self, handle: i32, offset: i32, value: i8) -> i32 {
        unsafe { (self.set_int8)(handle, offset, value) }
    }

    fn get_u16(&self, handle: i32, offset: i32) -> u16 {
        unsafe { (self.get_uint16)(handle, offset) }
    }

    fn set_u16(&self, handle: i32, offset: i32, value: u16) -> i32 {
        unsafe { (self.set_uint16)(handle, offset, value) }
    }

    fn get_i16(&self, handle: i32, offset: i32) -> i16 {
        unsafe { (self.get_int16)(handle, offset) }
    }

    fn set_i16(&self, handle: i32, offset: i32, value: i16) -> i32 {
        unsafe { (self.set_int16)(handle, offset, value) }
    }

    fn get_u32(&self, handle: i32, offset: i32) -> u32 {
        unsafe { (self.get_uint32)(handle, offset) }
    }

    fn set_u32(&self, handle: i32, offset: i32, value: u32) -> i32 {
        unsafe { (self.set_uint32)(handle, offset, value) }
    }

    fn get_i32(&self, handle: i32, offset: i32) -> i32 {
        unsafe { (self.get_int32)(handle, offset) }
    }

    fn set_i32(&self, handle: i32, offset: i32, value: i32) -> i32 {
        unsafe { (self.set_int32)(handle, offset, value) }
    }

    fn get_u64(&self, handle: i32, offset: i32) -> u64 {
        unsafe { (self.get_uint64)(handle, offset) }
    }

    fn set_u64(&self, handle: i32, offset: i32, value: u64) -> i32 {
        unsafe { (self.set_uint64)(handle, offset, value) }
    }

    fn get_i64(&self, handle: i32, offset: i32) -> i64 {
        unsafe { (self.get_int64)(handle, offset) }
    }

    fn set_i64(&self, handle: i32, offset: i32, value: i64) -> i32 {
        unsafe { (self.set_int64)(handle, offset, value) }
    }

    fn get_f32(&self, handle: i32, offset: i32) -> f32 {
        unsafe { (self.get_float32)(handle, offset) }
    }

    fn set_f32(&self, handle: i32, offset: i32, value: f32) -> i32 {
        unsafe { (self.set_float32)(handle, offset, value) }
    }

    fn get_f64(&self, handle: i32, offset: i32) -> f64 {
        unsafe { (self.get_float64)(handle, offset) }
    }

    fn set_f64(&self, handle: i32, offset: i32, value: f64) -> i32 {
        unsafe { (self.set_float64)(handle, offset, value) }
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("source", &self.source)
            .finish()
    }
}
