//! Named groups of tags read and written together.
//!
//! Every controller has a `default` group holding all of its tags. More
//! groups can be created with
//! [`PlcController::create_group`](crate::PlcController::create_group) and
//! filled with any tags, whatever their value type.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ab_plctag::mock::MockPlc;
//! use ab_plctag::{ControllerConfig, CpuType, PlcController};
//!
//! let controller = PlcController::new(
//!     ControllerConfig::new("10.0.0.5", "1,0", CpuType::Lgx),
//!     Arc::new(MockPlc::new()),
//! )?;
//! let speed = controller.create_tag::<f32>("Speed")?;
//! let running = controller.create_tag::<bool>("Running")?;
//!
//! let line = controller.create_group("Line1")?;
//! line.add(speed)?;
//! line.add(running)?;
//! line.connect()?;
//!
//! let results = line.read(false);
//! assert_eq!(results.len(), 2);
//! assert!(results.iter().all(|r| !r.is_error()));
//! # Ok::<(), ab_plctag::PlcTagError>(())
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{PlcTagError, Result};
use crate::result::OperationResult;
use crate::tag::AnyTag;

type GroupListener = Arc<dyn Fn(&[OperationResult]) + Send + Sync>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a background scan does on every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Read every tag.
    Read,
    /// Write every writable tag.
    Write,
    /// Read, then write.
    ReadAndWrite,
}

/// A named set of tags, unique by tag name.
pub struct TagGroup {
    name: String,
    enabled: AtomicBool,
    tags: Mutex<BTreeMap<String, Arc<dyn AnyTag>>>,
    listeners: Mutex<Vec<GroupListener>>,
}

impl TagGroup {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: AtomicBool::new(true),
            tags: Mutex::new(BTreeMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether reads and writes run.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Enables or disables the group.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Adds a tag.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::DuplicateTag`] if a tag with the same name is
    /// already in the group.
    pub fn add(&self, tag: Arc<dyn AnyTag>) -> Result<()> {
        let mut tags = locked(&self.tags);
        if tags.contains_key(tag.name()) {
            return Err(PlcTagError::DuplicateTag {
                name: tag.name().to_string(),
            });
        }
        tags.insert(tag.name().to_string(), tag);
        Ok(())
    }

    /// Removes a tag by name and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::TagNotFound`] if the tag is not in the group.
    pub fn remove(&self, name: &str) -> Result<Arc<dyn AnyTag>> {
        locked(&self.tags)
            .remove(name)
            .ok_or_else(|| PlcTagError::tag_not_found(name))
    }

    /// Removes every tag.
    pub fn clear(&self) {
        locked(&self.tags).clear();
    }

    /// Member tags, ordered by name.
    pub fn tags(&self) -> Vec<Arc<dyn AnyTag>> {
        locked(&self.tags).values().cloned().collect()
    }

    /// Returns whether a tag with this name is in the group.
    pub fn contains(&self, name: &str) -> bool {
        locked(&self.tags).contains_key(name)
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        locked(&self.tags).len()
    }

    /// Returns whether the group has no tags.
    pub fn is_empty(&self) -> bool {
        locked(&self.tags).is_empty()
    }

    /// Connects every tag. Stops at the first failure.
    pub fn connect(&self) -> Result<()> {
        for tag in self.tags() {
            tag.connect()?;
        }
        Ok(())
    }

    /// Disconnects every tag.
    pub fn disconnect(&self) {
        for tag in self.tags() {
            tag.disconnect();
        }
    }

    /// Reads every tag.
    ///
    /// Listeners receive the results of tags whose values changed, when at
    /// least one did. Returns every result, or only the changed ones when
    /// `only_changed` is set. A disabled group reads nothing.
    pub fn read(&self, only_changed: bool) -> Vec<OperationResult> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let mut results = Vec::new();
        let mut changed = Vec::new();
        for tag in self.tags() {
            let (result, changed_value) = tag.refresh();
            if changed_value {
                changed.push(result.clone());
            }
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.is_error()).count();
        tracing::debug!(
            group = %self.name,
            tags = results.len(),
            changed = changed.len(),
            failed,
            "group read"
        );

        if !changed.is_empty() {
            let listeners = locked(&self.listeners).clone();
            for listener in &listeners {
                listener(&changed);
            }
        }

        if only_changed {
            changed
        } else {
            results
        }
    }

    /// Writes every tag that is not read-only. A disabled group writes nothing.
    pub fn write(&self) -> Vec<OperationResult> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let results: Vec<OperationResult> = self
            .tags()
            .iter()
            .filter(|tag| !tag.is_read_only())
            .map(|tag| tag.flush())
            .collect();
        tracing::debug!(group = %self.name, tags = results.len(), "group write");
        results
    }

    /// Registers a listener called with the changed results of a read.
    pub fn on_changed(&self, listener: impl Fn(&[OperationResult]) + Send + Sync + 'static) {
        locked(&self.listeners).push(Arc::new(listener));
    }

    fn cycle(&self, mode: ScanMode) {
        if matches!(mode, ScanMode::Read | ScanMode::ReadAndWrite) {
            self.read(false);
        }
        if matches!(mode, ScanMode::Write | ScanMode::ReadAndWrite) {
            self.write();
        }
    }

    /// Starts a background thread running `mode` every `interval`.
    ///
    /// The first cycle runs immediately. The scan stops when the returned
    /// handle is stopped or dropped.
    ///
    /// # Errors
    ///
    /// Returns [`PlcTagError::InvalidParameter`] if the group is disabled or
    /// the interval is zero, and [`PlcTagError::Io`] if the thread cannot be
    /// spawned.
    pub fn scan(self: &Arc<Self>, interval: Duration, mode: ScanMode) -> Result<ScanHandle> {
        if !self.is_enabled() {
            return Err(PlcTagError::invalid_parameter(
                "group",
                format!("group '{}' is disabled", self.name),
            ));
        }
        if interval.is_zero() {
            return Err(PlcTagError::invalid_parameter(
                "interval",
                "must be greater than zero",
            ));
        }

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let group = Arc::clone(self);
        let thread = thread::Builder::new()
            .name(format!("plctag-scan-{}", self.name))
            .spawn(move || {
                tracing::debug!(group = %group.name, ?interval, ?mode, "scan started");
                loop {
                    group.cycle(mode);
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!(group = %group.name, "scan stopped");
            })?;

        Ok(ScanHandle {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

impl std::fmt::Debug for TagGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagGroup")
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("tags", &locked(&self.tags).keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Running background scan of a [`TagGroup`].
///
/// Stops the scan and waits for the thread on [`stop`](Self::stop) or drop.
#[derive(Debug)]
pub struct ScanHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Returns whether the scan thread is still running.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the scan and waits for the current cycle to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("scan thread panicked");
            }
        }
    }
}

impl Drop for ScanHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ControllerConfig, PlcController};
    use crate::cpu::CpuType;
    use crate::mock::MockPlc;
    use crate::status::StatusCode;
    use std::sync::atomic::AtomicUsize;

    fn controller() -> (Arc<MockPlc>, PlcController) {
        let plc = Arc::new(MockPlc::new());
        let config = ControllerConfig::new("10.0.0.5", "1,0", CpuType::Lgx);
        let controller = PlcController::new(config, plc.clone()).unwrap();
        (plc, controller)
    }

    #[test]
    fn test_membership() {
        let (_, controller) = controller();
        let a = controller.create_tag::<i32>("A").unwrap();
        let group = controller.create_group("G").unwrap();
        assert!(group.is_empty());
        group.add(a.clone()).unwrap();
        assert!(matches!(
            group.add(a),
            Err(PlcTagError::DuplicateTag { .. })
        ));
        assert_eq!(group.len(), 1);
        assert!(group.contains("A"));
        assert!(group.remove("A").is_ok());
        assert!(matches!(
            group.remove("A"),
            Err(PlcTagError::TagNotFound { .. })
        ));
    }

    #[test]
    fn test_read_only_changed() {
        let (plc, controller) = controller();
        plc.set_memory("A", 1i32.to_le_bytes().to_vec());
        controller.create_tag::<i32>("A").unwrap();
        controller.create_tag::<i32>("B").unwrap();
        let group = controller.default_group();
        group.connect().unwrap();

        assert_eq!(group.read(true).len(), 2);
        assert_eq!(group.read(true).len(), 0);
        assert_eq!(group.read(false).len(), 2);

        plc.set_memory("B", 9i32.to_le_bytes().to_vec());
        let changed = group.read(true);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].tag_name, "B");
    }

    #[test]
    fn test_listener_gets_changed_results() {
        let (plc, controller) = controller();
        controller.create_tag::<u8>("A").unwrap();
        let group = controller.default_group();
        group.connect().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        group.on_changed(move |results| {
            assert_eq!(results.len(), 1);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        group.read(false);
        group.read(false);
        plc.set_memory("A", vec![3]);
        group.read(false);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_can_register_listeners_and_read() {
        let (plc, controller) = controller();
        controller.create_tag::<i32>("A").unwrap();
        let group = Arc::clone(controller.default_group());
        group.connect().unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let weak = Arc::downgrade(&group);
        group.on_changed(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            if let Some(group) = weak.upgrade() {
                group.on_changed(|_| {});
                assert!(group.read(true).is_empty());
            }
        });

        group.read(false);
        plc.set_memory("A", 5i32.to_le_bytes().to_vec());
        group.read(false);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(group.listeners.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_changed_flag_comes_from_own_read() {
        let (plc, controller) = controller();
        plc.set_memory("A", 1i32.to_le_bytes().to_vec());
        let a = controller.create_tag::<i32>("A").unwrap();
        let group = controller.default_group();
        group.connect().unwrap();
        group.read(false);

        // The change was consumed by the direct read.
        plc.set_memory("A", 2i32.to_le_bytes().to_vec());
        a.read().unwrap();
        assert!(a.has_changed_value());
        assert!(group.read(true).is_empty());
    }

    #[test]
    fn test_read_reports_failures() {
        let (plc, controller) = controller();
        controller.create_tag::<i32>("A").unwrap();
        controller.create_tag::<i32>("B").unwrap();
        let group = controller.default_group();
        group.connect().unwrap();
        plc.fail_read("A", StatusCode::ErrTimeout);

        let results = group.read(false);
        assert_eq!(results[0].status, StatusCode::ErrTimeout);
        assert_eq!(results[1].status, StatusCode::Ok);
    }

    #[test]
    fn test_write_skips_read_only() {
        let (plc, controller) = controller();
        let a = controller.create_tag::<i32>("A").unwrap();
        controller.create_tag::<i32>("B").unwrap();
        let group = controller.default_group();
        group.connect().unwrap();
        a.set_read_only(true);

        let results = group.write();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tag_name, "B");
        assert_eq!(plc.write_count("A"), 0);
    }

    #[test]
    fn test_disabled_group() {
        let (plc, controller) = controller();
        controller.create_tag::<i32>("A").unwrap();
        let group = controller.default_group();
        group.connect().unwrap();
        group.set_enabled(false);
        assert!(group.read(false).is_empty());
        assert!(group.write().is_empty());
        assert_eq!(plc.read_count("A"), 0);
        assert!(group
            .scan(Duration::from_millis(10), ScanMode::Read)
            .is_err());
    }

    #[test]
    fn test_scan_rejects_zero_interval() {
        let (_, controller) = controller();
        let group = controller.create_group("G").unwrap();
        assert!(matches!(
            group.scan(Duration::ZERO, ScanMode::Read),
            Err(PlcTagError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_scan_runs_until_stopped() {
        let (plc, controller) = controller();
        controller.create_tag::<i32>("A").unwrap();
        let group = Arc::clone(controller.default_group());
        group.connect().unwrap();

        let scan = group
            .scan(Duration::from_millis(5), ScanMode::ReadAndWrite)
            .unwrap();
        while plc.read_count("A") < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(scan.is_running());
        scan.stop();

        let reads = plc.read_count("A");
        assert!(plc.write_count("A") >= 2);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(plc.read_count("A"), reads);
    }
}
