//! Allen-Bradley CPU families understood by libplctag.
//!
//! # CPU Families Overview
//!
//! | CPU | Controllers | Routing path |
//! |-----|-------------|:------------:|
//! | `Lgx` | ControlLogix, CompactLogix | required |
//! | `Plc5` | PLC-5 | optional |
//! | `Slc` | SLC 500 | optional |
//! | `Mlgx` | MicroLogix | optional |
//! | `Micro800` | Micro800 | optional |
//!
//! # Example
//!
//! ```
//! use ab_plctag::CpuType;
//!
//! assert!(CpuType::Lgx.requires_path());
//! assert!(!CpuType::Slc.requires_path());
//! assert_eq!(CpuType::Lgx.to_string(), "lgx");
//! assert_eq!("CompactLogix".parse::<CpuType>().unwrap(), CpuType::Lgx);
//! ```

use std::str::FromStr;

use crate::error::PlcTagError;

/// CPU family of the target controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CpuType {
    /// ControlLogix / CompactLogix.
    Lgx,
    /// PLC-5.
    Plc5,
    /// SLC 500.
    Slc,
    /// MicroLogix.
    Mlgx,
    /// Micro800.
    Micro800,
}

impl CpuType {
    /// Returns the value used for the `cpu` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            CpuType::Lgx => "lgx",
            CpuType::Plc5 => "plc5",
            CpuType::Slc => "slc",
            CpuType::Mlgx => "mlgx",
            CpuType::Micro800 => "micro800",
        }
    }

    /// Returns whether a routing path (port type and slot) is mandatory.
    pub fn requires_path(self) -> bool {
        matches!(self, CpuType::Lgx)
    }
}

impl std::fmt::Display for CpuType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CpuType {
    type Err = PlcTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lgx" | "controllogix" | "compactlogix" => Ok(CpuType::Lgx),
            "plc5" | "plc" => Ok(CpuType::Plc5),
            "slc" | "slc500" => Ok(CpuType::Slc),
            "mlgx" | "micrologix" => Ok(CpuType::Mlgx),
            "micro800" => Ok(CpuType::Micro800),
            other => Err(PlcTagError::invalid_parameter(
                "cpu",
                format!("unknown CPU type '{}'", other),
            )),
        }
    }
}
