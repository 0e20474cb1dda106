//! Interfaces to the services the host platform provides.
//!
//! Beacon does not implement storage, clocks, HTTP or performance
//! observation itself. It talks to them through the traits in this module.
//! In-memory implementations are included for tests and simulation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde_json::Value;

use crate::event::PerformanceEntry;

/// Synchronous key-value storage that never fails observably.
pub trait Storage: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&self, key: &str, value: String);
}

/// Process-local [`Storage`] backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a single key.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.entries.write().remove(key)
    }

    /// Remove every key.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }
}

/// Wall-clock source.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// Whole seconds since the Unix epoch.
    fn unix_seconds(&self) -> u64 {
        self.now_millis() / 1000
    }
}

/// [`Clock`] reading the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// [`Clock`] that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `millis`.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(millis),
        }
    }

    /// Create a clock frozen at a whole number of seconds.
    pub fn at_seconds(seconds: u64) -> Self {
        Self::new(seconds * 1000)
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Callback invoked by the request primitive.
pub type RequestCallback = Box<dyn FnOnce(Value) + Send>;

/// Options accepted by the host's outbound request primitive.
///
/// The primitive invokes exactly one of `success` / `fail`, then always
/// `complete`.
pub struct RequestOptions {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Request body.
    pub data: Value,
    /// Called with the response on success.
    pub success: Option<RequestCallback>,
    /// Called with the error on failure.
    pub fail: Option<RequestCallback>,
    /// Called last, on both paths.
    pub complete: Option<RequestCallback>,
}

impl RequestOptions {
    /// Create options with no callbacks.
    pub fn new(url: impl Into<String>, method: impl Into<String>, data: Value) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            data,
            success: None,
            fail: None,
            complete: None,
        }
    }

    /// Set the success callback.
    pub fn on_success(mut self, callback: impl FnOnce(Value) + Send + 'static) -> Self {
        self.success = Some(Box::new(callback));
        self
    }

    /// Set the failure callback.
    pub fn on_fail(mut self, callback: impl FnOnce(Value) + Send + 'static) -> Self {
        self.fail = Some(Box::new(callback));
        self
    }

    /// Set the completion callback.
    pub fn on_complete(mut self, callback: impl FnOnce(Value) + Send + 'static) -> Self {
        self.complete = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("has_success", &self.success.is_some())
            .field("has_fail", &self.fail.is_some())
            .field("has_complete", &self.complete.is_some())
            .finish()
    }
}

/// The host's single outbound request primitive.
pub trait RequestPrimitive: Send + Sync {
    /// Handle returned to callers, e.g. for aborting the request.
    type Handle;

    /// Start a request.
    fn request(&self, options: RequestOptions) -> Self::Handle;
}

/// Callback receiving each batch of observed performance entries.
pub type PerformanceCallback = Box<dyn Fn(Vec<PerformanceEntry>) + Send + Sync>;

/// The host's performance observation service.
pub trait PerformanceService: Send + Sync {
    /// Current high-resolution timestamp in milliseconds.
    fn now(&self) -> f64;

    /// Create an observer delivering entries to `callback`.
    fn create_observer(&self, callback: PerformanceCallback) -> Box<dyn PerformanceObserver>;
}

/// Handle to a performance observer created by a [`PerformanceService`].
pub trait PerformanceObserver: Send + Sync {
    /// Start observing the given entry types.
    fn observe(&self, entry_types: &[&str]);
}
