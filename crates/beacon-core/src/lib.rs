//! Beacon Core - Telemetry Client Foundations
//!
//! This crate provides the shared building blocks of the Beacon telemetry
//! client. It includes:
//!
//! - [`TrackerConfig`]: Client configuration (endpoint, app id, delivery mode)
//! - [`TelemetryEvent`]: The closed set of events instrumentation produces
//! - [`TelemetrySink`]: Where instrumentation sends its events
//! - [`IdentityStore`]: Stable, persisted client identifier
//! - Platform interfaces ([`Storage`], [`Clock`], [`RequestPrimitive`],
//!   [`PerformanceService`]) with in-memory implementations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Host application             │
//! ├─────────────────────────────────────────┤
//! │          beacon-telemetry (facade)      │
//! ├─────────────────────────────────────────┤
//! │  beacon-host  │  beacon-observe         │
//! ├─────────────────────────────────────────┤
//! │              beacon-core                │
//! └─────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod platform;
pub mod sink;

// Re-export main types at crate root
pub use config::{DEFAULT_SERVER_URL, DEFAULT_UID_STORAGE_KEY, DeliveryMode, TrackerConfig};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use event::{ConstructKind, LifecycleHook, LogKind, PerformanceEntry, TelemetryEvent};
pub use identity::{IDENTITY_STORAGE_KEY, IdGenerator, IdentityStore, RandomIdGenerator};
pub use platform::{
    Clock, ManualClock, MemoryStorage, PerformanceCallback, PerformanceObserver,
    PerformanceService, RequestCallback, RequestOptions, RequestPrimitive, Storage, SystemClock,
};
pub use sink::{CollectingSink, TelemetrySink};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{DeliveryMode, TrackerConfig};
    pub use crate::error::{ConfigError, CoreError};
    pub use crate::event::{ConstructKind, LifecycleHook, LogKind, TelemetryEvent};
    pub use crate::platform::{Clock, RequestOptions, RequestPrimitive, Storage};
    pub use crate::sink::TelemetrySink;
}
