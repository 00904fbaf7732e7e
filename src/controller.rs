//! Controller: the entry point of the object model.
//!
//! A [`PlcController`] holds the connection settings for one PLC (gateway,
//! routing path, CPU family, timeout, debug level), owns the tag and group
//! registries, and hands out typed [`Tag`]s.
//!
//! # Example
//!
//! ```no_run
//! use ab_plctag::{ControllerConfig, CpuType, PlcController};
//! use std::time::Duration;
//!
//! let config = ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx)
//!     .with_timeout(Duration::from_secs(2));
//! let controller = PlcController::with_native(config)?;
//!
//! let speed = controller.create_tag::<f32>("Line1.Speed")?;
//! let batch = controller.create_tag_array::<i32>("BatchCounts", 10)?;
//! controller.connect()?;
//!
//! println!("speed = {}", speed.read()?);
//! println!("batches = {:?}", batch.read_array()?);
//! # Ok::<(), ab_plctag::PlcTagError>(())
//! ```
//!
//! # Settings at call time
//!
//! Tags keep a reference to the controller settings, not a copy. Changing
//! the timeout or debug level with [`PlcController::set_timeout`] and
//! [`PlcController::set_debug_level`] affects every later engine call of
//! existing tags, and the attribute string is built when a tag connects.

use std::collections::BTreeMap;
use std::io;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::api::PlcTagApi;
use crate::cpu::CpuType;
use crate::error::{PlcTagError, Result};
use crate::ffi::NativeLibrary;
use crate::group::TagGroup;
use crate::tag::{AnyTag, Tag};
use crate::value::TagValue;

/// Name of the group every tag joins on creation.
pub const DEFAULT_GROUP: &str = "default";

/// Default engine timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Highest engine debug level.
pub const MAX_DEBUG_LEVEL: u8 = 5;

/// EtherNet/IP explicit messaging port.
pub const ETHERNET_IP_PORT: u16 = 44818;

/// Configuration for creating a [`PlcController`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    /// Gateway IP address or hostname, optionally with `:port`.
    pub gateway: String,
    /// Routing path from the gateway to the CPU, e.g. `1,0`.
    pub path: String,
    /// CPU family.
    pub cpu: CpuType,
    /// Engine timeout for every blocking call.
    pub timeout: Duration,
    /// Engine debug level, 0 to 5.
    pub debug_level: u8,
    /// Share one EtherNet/IP session between tags of this controller.
    pub share_session: bool,
}

impl ControllerConfig {
    /// Creates a configuration with the default timeout, debug off and
    /// session sharing on.
    ///
    /// # Example
    ///
    /// ```
    /// use ab_plctag::{ControllerConfig, CpuType};
    ///
    /// let config = ControllerConfig::new("192.168.1.10", "1,0", CpuType::Lgx);
    /// assert_eq!(config.timeout.as_millis(), 5000);
    /// ```
    pub fn new(gateway: impl Into<String>, path: impl Into<String>, cpu: CpuType) -> Self {
        Self {
            gateway: gateway.into(),
            path: path.into(),
            cpu,
            timeout: DEFAULT_TIMEOUT,
            debug_level: 0,
            share_session: true,
        }
    }

    /// Sets the engine timeout (default is 5 seconds).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the engine debug level (default is 0).
    pub fn with_debug_level(mut self, level: u8) -> Self {
        self.debug_level = level;
        self
    }

    /// Enables or disables session sharing (default is on).
    pub fn with_share_session(mut self, share: bool) -> Self {
        self.share_session = share;
        self
    }

    /// Checks that the configuration can be used to talk to a PLC.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::InvalidConfig`] when the gateway is empty, a
    /// Logix CPU has no path, the timeout is zero or the debug level is
    /// above 5.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.trim().is_empty() {
            return Err(PlcTagError::invalid_config("gateway must not be empty"));
        }
        if self.cpu.requires_path() && self.path.trim().is_empty() {
            return Err(PlcTagError::invalid_config(format!(
                "path is required for {} CPUs",
                self.cpu
            )));
        }
        if self.timeout.is_zero() {
            return Err(PlcTagError::invalid_config("timeout must be greater than zero"));
        }
        if self.debug_level > MAX_DEBUG_LEVEL {
            return Err(PlcTagError::invalid_config(format!(
                "debug level {} is above {}",
                self.debug_level, MAX_DEBUG_LEVEL
            )));
        }
        Ok(())
    }
}

fn timeout_to_ms(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX)
}

/// Settings shared by a controller and all of its tags.
pub(crate) struct ControllerContext {
    pub(crate) gateway: String,
    pub(crate) path: String,
    pub(crate) cpu: CpuType,
    pub(crate) share_session: bool,
    pub(crate) api: Arc<dyn PlcTagApi>,
    timeout_ms: AtomicI32,
    debug_level: AtomicU8,
}

impl ControllerContext {
    pub(crate) fn new(config: &ControllerConfig, api: Arc<dyn PlcTagApi>) -> Self {
        Self {
            gateway: config.gateway.clone(),
            path: config.path.clone(),
            cpu: config.cpu,
            share_session: config.share_session,
            api,
            timeout_ms: AtomicI32::new(timeout_to_ms(config.timeout)),
            debug_level: AtomicU8::new(config.debug_level),
        }
    }

    pub(crate) fn timeout_ms(&self) -> i32 {
        self.timeout_ms.load(Ordering::Relaxed)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.timeout_ms()).unwrap_or(0))
    }

    pub(crate) fn debug_level(&self) -> u8 {
        self.debug_level.load(Ordering::Relaxed)
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Allen-Bradley controller and registry of its tags and groups.
///
/// # Thread Safety
///
/// All methods take `&self`. Registries are guarded by mutexes and settings
/// are atomics, so a controller can be shared between threads in an `Arc`.
pub struct PlcController {
    ctx: Arc<ControllerContext>,
    tags: Mutex<BTreeMap<String, Arc<dyn AnyTag>>>,
    groups: Mutex<BTreeMap<String, Arc<TagGroup>>>,
    default_group: Arc<TagGroup>,
}

impl PlcController {
    /// Creates a controller that talks to the given engine.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::InvalidConfig`] if the configuration does not
    /// validate.
    pub fn new(config: ControllerConfig, api: Arc<dyn PlcTagApi>) -> Result<Self> {
        config.validate()?;
        let default_group = Arc::new(TagGroup::new(DEFAULT_GROUP));
        let mut groups = BTreeMap::new();
        groups.insert(DEFAULT_GROUP.to_string(), Arc::clone(&default_group));

        tracing::debug!(
            gateway = %config.gateway,
            path = %config.path,
            cpu = %config.cpu,
            "controller created"
        );

        Ok(Self {
            ctx: Arc::new(ControllerContext::new(&config, api)),
            tags: Mutex::new(BTreeMap::new()),
            groups: Mutex::new(groups),
            default_group,
        })
    }

    /// Creates a controller on the native libplctag library.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::LibraryNotFound`] if libplctag cannot be loaded.
    pub fn with_native(config: ControllerConfig) -> Result<Self> {
        let api = NativeLibrary::load()?;
        Self::new(config, api)
    }

    /// Gateway IP address or hostname.
    pub fn gateway(&self) -> &str {
        &self.ctx.gateway
    }

    /// Routing path to the CPU.
    pub fn path(&self) -> &str {
        &self.ctx.path
    }

    /// CPU family.
    pub fn cpu_type(&self) -> CpuType {
        self.ctx.cpu
    }

    /// Whether tags share one session.
    pub fn share_session(&self) -> bool {
        self.ctx.share_session
    }

    /// Engine timeout applied to blocking calls.
    pub fn timeout(&self) -> Duration {
        self.ctx.timeout()
    }

    /// Changes the engine timeout for all later calls.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::InvalidParameter`] for a zero timeout.
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(PlcTagError::invalid_parameter(
                "timeout",
                "must be greater than zero",
            ));
        }
        self.ctx
            .timeout_ms
            .store(timeout_to_ms(timeout), Ordering::Relaxed);
        Ok(())
    }

    /// Engine debug level.
    pub fn debug_level(&self) -> u8 {
        self.ctx.debug_level()
    }

    /// Changes the engine debug level for tags connected afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::InvalidParameter`] for a level above 5.
    pub fn set_debug_level(&self, level: u8) -> Result<()> {
        if level > MAX_DEBUG_LEVEL {
            return Err(PlcTagError::invalid_parameter(
                "debug_level",
                format!("must be between 0 and {}", MAX_DEBUG_LEVEL),
            ));
        }
        self.ctx.debug_level.store(level, Ordering::Relaxed);
        Ok(())
    }

    /// Engine this controller talks to.
    pub fn api(&self) -> &Arc<dyn PlcTagApi> {
        &self.ctx.api
    }

    /// Creates a single-element tag. See [`create_tag_array`](Self::create_tag_array).
    pub fn create_tag<T: TagValue>(&self, name: &str) -> Result<Arc<Tag<T>>> {
        self.create_tag_array(name, 1)
    }

    /// Creates a tag of `length` elements and registers it.
    ///
    /// The tag joins the default group and is not connected yet.
    ///
    /// # Errors
    ///
    /// - [`PlcTagError::InvalidParameter`] for an empty name or a length of 0
    /// - [`PlcTagError::DuplicateTag`] if the name is already registered
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use ab_plctag::mock::MockPlc;
    /// use ab_plctag::{ControllerConfig, CpuType, PlcController};
    ///
    /// let controller = PlcController::new(
    ///     ControllerConfig::new("10.0.0.5", "1,0", CpuType::Lgx),
    ///     Arc::new(MockPlc::new()),
    /// )?;
    /// let temps = controller.create_tag_array::<f32>("Temps", 8)?;
    /// assert!(temps.is_array());
    /// assert!(controller.default_group().contains("Temps"));
    /// # Ok::<(), ab_plctag::PlcTagError>(())
    /// ```
    pub fn create_tag_array<T: TagValue>(&self, name: &str, length: usize) -> Result<Arc<Tag<T>>> {
        if name.trim().is_empty() {
            return Err(PlcTagError::invalid_parameter("name", "must not be empty"));
        }
        if length < 1 {
            return Err(PlcTagError::invalid_parameter("length", "must be at least 1"));
        }

        let tag = {
            let mut tags = locked(&self.tags);
            if tags.contains_key(name) {
                return Err(PlcTagError::DuplicateTag {
                    name: name.to_string(),
                });
            }
            let tag = Arc::new(Tag::<T>::new(name, length, Arc::clone(&self.ctx)));
            // The default group can hold foreign tags; register only once it
            // accepted this one.
            self.default_group.add(tag.clone())?;
            tags.insert(name.to_string(), tag.clone() as Arc<dyn AnyTag>);
            tag
        };

        tracing::debug!(tag = name, length, value_type = T::TYPE_NAME, "tag created");
        Ok(tag)
    }

    /// Returns whether a tag with this name is registered.
    pub fn tag_exists(&self, name: &str) -> bool {
        locked(&self.tags).contains_key(name)
    }

    /// Looks up a tag by name.
    pub fn tag(&self, name: &str) -> Option<Arc<dyn AnyTag>> {
        locked(&self.tags).get(name).cloned()
    }

    /// Looks up a tag by name with its value type.
    ///
    /// # Errors
    ///
    /// - [`PlcTagError::TagNotFound`] if no tag has this name
    /// - [`PlcTagError::TypeMismatch`] if the tag holds another value type
    pub fn typed_tag<T: TagValue>(&self, name: &str) -> Result<Arc<Tag<T>>> {
        let tag = self.tag(name).ok_or_else(|| PlcTagError::tag_not_found(name))?;
        let actual = tag.value_type();
        tag.into_any_arc()
            .downcast::<Tag<T>>()
            .map_err(|_| PlcTagError::TypeMismatch {
                tag: name.to_string(),
                expected: T::TYPE_NAME,
                actual,
            })
    }

    /// All registered tags, ordered by name.
    pub fn tags(&self) -> Vec<Arc<dyn AnyTag>> {
        locked(&self.tags).values().cloned().collect()
    }

    /// Creates an empty named group.
    ///
    /// # Errors
    ///
    /// - [`PlcTagError::InvalidGroupName`] for `default` or an empty name
    /// - [`PlcTagError::DuplicateGroup`] if the name is taken
    pub fn create_group(&self, name: &str) -> Result<Arc<TagGroup>> {
        if name == DEFAULT_GROUP || name.trim().is_empty() {
            return Err(PlcTagError::InvalidGroupName {
                name: name.to_string(),
            });
        }
        let mut groups = locked(&self.groups);
        if groups.contains_key(name) {
            return Err(PlcTagError::DuplicateGroup {
                name: name.to_string(),
            });
        }
        let group = Arc::new(TagGroup::new(name));
        groups.insert(name.to_string(), Arc::clone(&group));
        Ok(group)
    }

    /// Looks up a group by name, including `default`.
    pub fn group(&self, name: &str) -> Option<Arc<TagGroup>> {
        locked(&self.groups).get(name).cloned()
    }

    /// Group holding every tag created by this controller.
    pub fn default_group(&self) -> &Arc<TagGroup> {
        &self.default_group
    }

    /// All groups, ordered by name.
    pub fn groups(&self) -> Vec<Arc<TagGroup>> {
        locked(&self.groups).values().cloned().collect()
    }

    /// Connects every registered tag. Stops at the first failure.
    pub fn connect(&self) -> Result<()> {
        for tag in self.tags() {
            tag.connect()?;
        }
        Ok(())
    }

    /// Disconnects every registered tag.
    pub fn disconnect(&self) {
        for tag in self.tags() {
            tag.disconnect();
        }
    }

    /// Engine text for a status code.
    pub fn decode_error(&self, code: i32) -> String {
        self.ctx.api.decode_error(code)
    }

    fn probe_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        let gateway = self.ctx.gateway.trim();
        if let Ok(addr) = gateway.parse::<SocketAddr>() {
            return Ok(vec![addr]);
        }
        if let Ok(ip) = gateway.parse::<IpAddr>() {
            return Ok(vec![SocketAddr::new(ip, ETHERNET_IP_PORT)]);
        }
        let addrs = if gateway.contains(':') {
            gateway.to_socket_addrs()?.collect()
        } else {
            (gateway, ETHERNET_IP_PORT).to_socket_addrs()?.collect()
        };
        Ok(addrs)
    }

    /// Probes the gateway with a TCP connection to the EtherNet/IP port.
    ///
    /// Returns the time the connection took. The probe uses the controller
    /// timeout for each resolved address.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::Io`] if the gateway does not resolve or no
    /// address accepts a connection.
    pub fn ping(&self) -> Result<Duration> {
        let addrs = self.probe_addrs()?;
        let timeout = self.ctx.timeout();
        let mut last_err = io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("gateway '{}' did not resolve", self.ctx.gateway),
        );

        for addr in addrs {
            let started = Instant::now();
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(_) => {
                    let elapsed = started.elapsed();
                    tracing::info!(%addr, elapsed_ms = elapsed.as_millis() as u64, "gateway reachable");
                    return Ok(elapsed);
                }
                Err(err) => {
                    tracing::info!(%addr, error = %err, "gateway probe failed");
                    last_err = err;
                }
            }
        }
        Err(last_err.into())
    }

    /// Returns whether [`ping`](Self::ping) succeeds.
    pub fn is_reachable(&self) -> bool {
        self.ping().is_ok()
    }
}

impl Drop for PlcController {
    fn drop(&mut self) {
        self.disconnect();
        for group in locked(&self.groups).values() {
            group.clear();
        }
        locked(&self.groups).clear();
        locked(&self.tags).clear();
    }
}

impl std::fmt::Debug for PlcController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlcController")
            .field("gateway", &self.ctx.gateway)
            .field("path", &self.ctx.path)
            .field("cpu", &self.ctx.cpu)
            .field("timeout", &self.ctx.timeout())
            .field("debug_level", &self.ctx.debug_level())
            .field("tags", &locked(&self.tags).len())
            .finish()
    }
}
