//! The engine surface consumed by the object model.
//!
//! [`PlcTagApi`] mirrors libplctag's handle-based C functions one-to-one.
//! The object model ([`PlcController`](crate::PlcController),
//! [`Tag`](crate::Tag), [`TagGroup`](crate::TagGroup)) only talks to the
//! engine through this trait, so the same code runs against the real
//! library ([`NativeLibrary`](crate::NativeLibrary)) or the in-memory
//! [`MockPlc`](crate::mock::MockPlc).
//!
//! All methods return raw engine values. Status-returning calls produce a
//! value convertible with [`StatusCode::from_code`](crate::StatusCode::from_code).
//! Getters return a sentinel on failure and record the failure in the tag
//! status, which callers read back with [`PlcTagApi::status`].

/// Handle-based access to a PLC tag engine.
pub trait PlcTagApi: Send + Sync {
    /// Creates a tag from an attribute string.
    ///
    /// Returns a positive handle, or a negative status code on failure.
    /// With `timeout_ms == 0` the call returns immediately and the tag
    /// status stays pending until the connection is ready.
    fn create(&self, attributes: &str, timeout_ms: i32) -> i32;

    /// Destroys a tag and releases its resources.
    fn destroy(&self, handle: i32) -> i32;

    /// Reads the tag from the PLC into the local buffer.
    fn read(&self, handle: i32, timeout_ms: i32) -> i32;

    /// Writes the local buffer to the PLC.
    fn write(&self, handle: i32, timeout_ms: i32) -> i32;

    /// Returns the status of the last operation on the tag.
    fn status(&self, handle: i32) -> i32;

    /// Aborts any outstanding operation on the tag.
    fn abort(&self, handle: i32) -> i32;

    /// Returns the local buffer size in bytes, or a negative status.
    fn size(&self, handle: i32) -> i32;

    /// Acquires the tag's engine-side mutex.
    fn lock(&self, handle: i32) -> i32;

    /// Releases the tag's engine-side mutex.
    fn unlock(&self, handle: i32) -> i32;

    /// Returns the engine's text for a status code.
    fn decode_error(&self, code: i32) -> String;

    /// Reads an unsigned 8-bit value at `offset`.
    fn get_u8(&self, handle: i32, offset: i32) -> u8;
    /// Writes an unsigned 8-bit value at `offset`.
    fn set_u8(&self, handle: i32, offset: i32, value: u8) -> i32;
    /// Reads a signed 8-bit value at `offset`.
    fn get_i8(&self, handle: i32, offset: i32) -> i8;
    /// Writes a signed 8-bit value at `offset`.
    fn set_i8(&self, handle: i32, offset: i32, value: i8) -> i32;
    /// Reads an unsigned 16-bit value at `offset`.
    fn get_u16(&self, handle: i32, offset: i32) -> u16;
    /// Writes an unsigned 16-bit value at `offset`.
    fn set_u16(&self, handle: i32, offset: i32, value: u16) -> i32;
    /// Reads a signed 16-bit value at `offset`.
    fn get_i16(&self, handle: i32, offset: i32) -> i16;
    /// Writes a signed 16-bit value at `offset`.
    fn set_i16(&self, handle: i32, offset: i32, value: i16) -> i32;
    /// Reads an unsigned 32-bit value at `offset`.
    fn get_u32(&self, handle: i32, offset: i32) -> u32;
    /// Writes an unsigned 32-bit value at `offset`.
    fn set_u32(&self, handle: i32, offset: i32, value: u32) -> i32;
    /// Reads a signed 32-bit value at `offset`.
    fn get_i32(&self, handle: i32, offset: i32) -> i32;
    /// Writes a signed 32-bit value at `offset`.
    fn set_i32(&self, handle: i32, offset: i32, value: i32) -> i32;
    /// Reads an unsigned 64-bit value at `offset`.
    fn get_u64(&self, handle: i32, offset: i32) -> u64;
    /// Writes an unsigned 64-bit value at `offset`.
    fn set_u64(&self, handle: i32, offset: i32, value: u64) -> i32;
    /// Reads a signed 64-bit value at `offset`.
    fn get_i64(&self, handle: i32, offset: i32) -> i64;
    /// Writes a signed 64-bit value at `offset`.
    fn set_i64(&self, handle: i32, offset: i32, value: i64) -> i32;
    /// Reads a 32-bit float at `offset`.
    fn get_f32(&self, handle: i32, offset: i32) -> f32;
    /// Writes a 32-bit float at `offset`.
    fn set_f32(&self, handle: i32, offset: i32, value: f32) -> i32;
    /// Reads a 64-bit float at `offset`.
    fn get_f64(&self, handle: i32, offset: i32) -> f64;
    /// Writes a 64-bit float at `offset`.
    fn set_f64(&self, handle: i32, offset: i32, value: f64) -> i32;
}
