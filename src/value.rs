//! Typed access to a tag's local buffer.
//!
//! Each supported Rust type knows its element size and which engine
//! getter/setter moves it in and out of the buffer.
//!
//! | Rust type | PLC type | Size (bytes) |
//! |-----------|----------|-------------:|
//! | `i64` / `u64` | LINT / ULINT | 8 |
//! | `i32` / `u32` | DINT / UDINT | 4 |
//! | `i16` / `u16` | INT / UINT | 2 |
//! | `i8` / `u8` | SINT / USINT | 1 |
//! | `f32` | REAL | 4 |
//! | `f64` | LREAL | 8 |
//! | `bool` | BOOL | 1 |
//! | `String` | STRING | 88 |
//!
//! The engine returns sentinel values when a get fails, and those sentinels
//! are also legal data, so the engine status is checked after every get.

use crate::api::PlcTagApi;
use crate::status::StatusCode;

/// Length prefix size of a STRING.
pub const STRING_HEADER_SIZE: usize = 4;

/// Maximum number of characters in a STRING.
pub const STRING_MAX_LENGTH: usize = 82;

/// Size of a STRING element (DINT length, 82 data bytes, 2 pad bytes).
pub const STRING_SIZE: usize = 88;

/// A value type that can live in a tag.
pub trait TagValue: Clone + PartialEq + Send + Sync + 'static {
    /// Size of one element in bytes.
    const ELEMENT_SIZE: usize;

    /// PLC-side type name.
    const TYPE_NAME: &'static str;

    /// Reads one element at `offset` of the tag buffer.
    fn decode(api: &dyn PlcTagApi, handle: i32, offset: i32) -> Result<Self, StatusCode>;

    /// Writes one element at `offset` of the tag buffer.
    fn encode(&self, api: &dyn PlcTagApi, handle: i32, offset: i32) -> StatusCode;
}

/// Returns `value` unless the engine flagged the preceding get as failed.
fn checked<T>(api: &dyn PlcTagApi, handle: i32, value: T) -> Result<T, StatusCode> {
    let status = StatusCode::from_code(api.status(handle));
    if status.is_error() {
        Err(status)
    } else {
        Ok(value)
    }
}

macro_rules! numeric_value {
    ($ty:ty, $plc:literal, $get:ident, $set:ident) => {
        impl TagValue for $ty {
            const ELEMENT_SIZE: usize = std::mem::size_of::<$ty>();
            const TYPE_NAME: &'static str = $plc;

            fn decode(api: &dyn PlcTagApi, handle: i32, offset: i32) -> Result<Self, StatusCode> {
                let value = api.$get(handle, offset);
                checked(api, handle, value)
            }

            fn encode(&self, api: &dyn PlcTagApi, handle: i32, offset: i32) -> StatusCode {
                StatusCode::from_code(api.$set(handle, offset, *self))
            }
        }
    };
}

numeric_value!(i64, "LINT", get_i64, set_i64);
numeric_value!(u64, "ULINT", get_u64, set_u64);
numeric_value!(i32, "DINT", get_i32, set_i32);
numeric_value!(u32, "UDINT", get_u32, set_u32);
numeric_value!(i16, "INT", get_i16, set_i16);
numeric_value!(u16, "UINT", get_u16, set_u16);
numeric_value!(i8, "SINT", get_i8, set_i8);
numeric_value!(u8, "USINT", get_u8, set_u8);
numeric_value!(f32, "REAL", get_f32, set_f32);
numeric_value!(f64, "LREAL", get_f64, set_f64);

impl TagValue for bool {
    const ELEMENT_SIZE: usize = 1;
    const TYPE_NAME: &'static str = "BOOL";

    fn decode(api: &dyn PlcTagApi, handle: i32, offset: i32) -> Result<Self, StatusCode> {
        let byte = api.get_u8(handle, offset);
        checked(api, handle, byte > 0)
    }

    fn encode(&self, api: &dyn PlcTagApi, handle: i32, offset: i32) -> StatusCode {
        StatusCode::from_code(api.set_u8(handle, offset, u8::from(*self)))
    }
}

impl TagValue for String {
    const ELEMENT_SIZE: usize = STRING_SIZE;
    const TYPE_NAME: &'static str = "STRING";

    fn decode(api: &dyn PlcTagApi, handle: i32, offset: i32) -> Result<Self, StatusCode> {
        let length = checked(api, handle, api.get_i32(handle, offset))?;
        let length = length.clamp(0, STRING_MAX_LENGTH as i32);

        let mut bytes = Vec::with_capacity(length as usize);
        for i in 0..length {
            let byte = api.get_u8(handle, offset + STRING_HEADER_SIZE as i32 + i);
            bytes.push(checked(api, handle, byte)?);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn encode(&self, api: &dyn PlcTagApi, handle: i32, offset: i32) -> StatusCode {
        let bytes = self.as_bytes();
        if bytes.len() > STRING_MAX_LENGTH {
            return StatusCode::ErrTooLarge;
        }

        let status = StatusCode::from_code(api.set_i32(handle, offset, bytes.len() as i32));
        if status.is_error() {
            return status;
        }

        let data = offset + STRING_HEADER_SIZE as i32;
        let padded = bytes.iter().copied().chain(std::iter::repeat(0));
        for (i, byte) in padded.take(STRING_MAX_LENGTH).enumerate() {
            let status = StatusCode::from_code(api.set_u8(handle, data + i as i32, byte));
            if status.is_error() {
                return status;
            }
        }
        StatusCode::Ok
    }
}
