//! Tag attribute strings.
//!
//! libplctag describes every tag with a `key=value` list joined by `&`.
//! This module builds that string from controller settings and tag shape.
//!
//! # Attribute Layout
//!
//! | Key | Value | Present |
//! |-----|-------|---------|
//! | `protocol` | always `ab_eip` | always |
//! | `gateway` | IP address or host of the gateway | always |
//! | `path` | routing path, e.g. `1,0` | when set |
//! | `cpu` | [`CpuType`] attribute name | always |
//! | `elem_size` | element size in bytes | always |
//! | `elem_count` | number of elements | always |
//! | `name` | tag name | always |
//! | `debug` | engine debug level 1-5 | when > 0 |
//! | `share_session` | `1` | when sharing |
//!
//! # Example
//!
//! ```
//! use ab_plctag::{CpuType, TagAttributes};
//!
//! let attrs = TagAttributes::new("192.168.1.10", CpuType::Lgx, "Counter", 4, 1)
//!     .with_path("1,0");
//! assert_eq!(
//!     attrs.to_string(),
//!     "protocol=ab_eip&gateway=192.168.1.10&path=1,0&cpu=lgx&elem_size=4&elem_count=1&name=Counter&share_session=1"
//! );
//! ```

use crate::cpu::CpuType;

/// Protocol attribute value for Allen-Bradley EtherNet/IP.
pub const PROTOCOL: &str = "ab_eip";

/// Attributes describing one tag to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAttributes {
    /// Gateway IP address or hostname.
    pub gateway: String,
    /// Routing path from the gateway to the CPU.
    pub path: Option<String>,
    /// CPU family.
    pub cpu: CpuType,
    /// Size of one element in bytes.
    pub elem_size: usize,
    /// Number of elements.
    pub elem_count: usize,
    /// Tag name.
    pub name: String,
    /// Engine debug level (0 = off).
    pub debug_level: u8,
    /// Share the EtherNet/IP session with other tags on the same gateway.
    pub share_session: bool,
}

impl TagAttributes {
    /// Creates attributes with no path, no debug output and session sharing on.
    pub fn new(
        gateway: impl Into<String>,
        cpu: CpuType,
        name: impl Into<String>,
        elem_size: usize,
        elem_count: usize,
    ) -> Self {
        Self {
            gateway: gateway.into(),
            path: None,
            cpu,
            elem_size,
            elem_count,
            name: name.into(),
            debug_level: 0,
            share_session: true,
        }
    }

    /// Sets the routing path. An empty path is treated as absent.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.is_empty() { None } else { Some(path) };
        self
    }

    /// Sets the engine debug level.
    pub fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    /// Enables or disables session sharing.
    pub fn with_share_session(mut self, share: bool) -> Self {
        self.share_session = share;
        self
    }
}

impl std::fmt::Display for TagAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "protocol={}&gateway={}", PROTOCOL, self.gateway)?;
        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            write!(f, "&path={}", path)?;
        }
        write!(
            f,
            "&cpu={}&elem_size={}&elem_count={}&name={}",
            self.cpu, self.elem_size, self.elem_count, self.name
        )?;
        if self.debug_level > 0 {
            write!(f, "&debug={}", self.debug_level)?;
        }
        if self.share_session {
            f.write_str("&share_session=1")?;
        }
        Ok(())
    }
}

/// Looks up one attribute value in an attribute string.
///
/// # Example
///
/// ```
/// use ab_plctag::attribute_value;
///
/// let attrs = "protocol=ab_eip&gateway=10.0.0.1&name=Speed&elem_size=4";
/// assert_eq!(attribute_value(attrs, "name"), Some("Speed"));
/// assert_eq!(attribute_value(attrs, "path"), None);
/// ```
pub fn attribute_value<'a>(attributes: &'a str, key: &str) -> Option<&'a str> {
    attributes
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
}
