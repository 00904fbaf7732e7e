//! # Allen-Bradley PLC Tag Library
//!
//! A Rust library for reading and writing tags on Allen-Bradley PLCs
//! (ControlLogix, CompactLogix, PLC-5, SLC 500, MicroLogix, Micro800).
//!
//! All EtherNet/IP and CIP work is done by the
//! [libplctag](https://github.com/libplctag/libplctag) communications engine,
//! loaded at runtime. This crate adds a typed object model on top of it:
//! controllers, typed tags, groups, and explicit operation results.
//!
//! ## Features
//!
//! - **Typed tags**: `Tag<i32>`, `Tag<f32>`, `Tag<bool>`, `Tag<String>`, arrays of any of them
//! - **Explicit results**: every engine call is timed and recorded as an [`OperationResult`]
//! - **No panics**: all errors returned as `Result<T, PlcTagError>`
//! - **Groups and scans**: read or write sets of tags, in the background if needed
//! - **Runs without hardware**: the [`mock`] engine simulates controller memory
//! - **Optional async**: `async` feature for non-blocking reads and writes on tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use ab_plctag::{ControllerConfig, CpuType, PlcController};
//!
//! fn main() -> ab_plctag::Result<()> {
//!     // ControlLogix at 192.168.1.10, CPU in slot 0 of the backplane
//!     let config = ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx);
//!     let controller = PlcController::with_native(config)?;
//!
//!     let counter = controller.create_tag::<i32>("Counter")?;
//!     let temps = controller.create_tag_array::<f32>("Temperatures", 4)?;
//!     controller.connect()?;
//!
//!     println!("Counter = {}", counter.read()?);
//!     println!("Temperatures = {:?}", temps.read_array()?);
//!
//!     counter.write(0)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Value Types
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
//! ## Groups
//!
//! ```no_run
//! # use ab_plctag::{ControllerConfig, CpuType, PlcController, ScanMode};
//! # use std::time::Duration;
//! # let controller = PlcController::with_native(
//! #     ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx))?;
//! let speed = controller.create_tag::<f32>("Line1.Speed")?;
//! let line = controller.create_group("Line1")?;
//! line.add(speed)?;
//! line.connect()?;
//!
//! line.on_changed(|results| {
//!     for result in results {
//!         println!("{} changed", result.tag_name);
//!     }
//! });
//!
//! // Poll every 500 ms until the handle is dropped
//! let scan = line.scan(Duration::from_millis(500), ScanMode::Read)?;
//! std::thread::sleep(Duration::from_secs(5));
//! scan.stop();
//! # Ok::<(), ab_plctag::PlcTagError>(())
//! ```
//!
//! ## Error Handling
//!
//! Engine failures carry the full [`OperationResult`], including the engine
//! status and its decoded text.
//!
//! ```no_run
//! use ab_plctag::{ControllerConfig, CpuType, PlcController, PlcTagError, StatusCode};
//!
//! let controller = PlcController::with_native(
//!     ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx),
//! )?;
//! let tag = controller.create_tag::<i32>("Counter")?;
//! tag.connect()?;
//!
//! match tag.read() {
//!     Ok(value) => println!("Counter = {}", value),
//!     Err(PlcTagError::Operation { result }) if result.status == StatusCode::ErrTimeout => {
//!         println!("PLC did not answer within {} ms", controller.timeout().as_millis());
//!     }
//!     Err(PlcTagError::Operation { result }) => println!("{}", result),
//!     Err(e) => println!("Error: {}", e),
//! }
//! # Ok::<(), PlcTagError>(())
//! ```
//!
//! ## Finding libplctag
//!
//! [`NativeLibrary::load`] tries the file named by the `LIBPLCTAG_PATH`
//! environment variable first, then the platform library names
//! (`libplctag.so.2`, `libplctag.dylib`, `plctag.dll`, ...).

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod api;
mod attributes;
mod controller;
mod cpu;
mod error;
mod ffi;
mod group;
pub mod mock;
mod result;
mod status;
mod tag;
mod value;

// Public re-exports
pub use api::PlcTagApi;
pub use attributes::{attribute_value, TagAttributes, PROTOCOL};
pub use controller::{
    ControllerConfig, PlcController, DEFAULT_GROUP, DEFAULT_TIMEOUT, ETHERNET_IP_PORT,
    MAX_DEBUG_LEVEL,
};
pub use cpu::CpuType;
pub use error::{PlcTagError, Result};
pub use ffi::{NativeLibrary, LIBRARY_PATH_ENV, LIB_NAMES};
pub use group::{ScanHandle, ScanMode, TagGroup};
pub use result::{Operation, OperationResult};
pub use status::StatusCode;
pub use tag::{AnyTag, Tag, TagLockGuard};
pub use value::{TagValue, STRING_MAX_LENGTH, STRING_SIZE};
