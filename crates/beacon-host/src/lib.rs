//! Beacon Host Interception
//!
//! This crate instruments the constructs a host application registers and
//! the host's outbound request primitive. It includes:
//!
//! - [`Definition`]: Typed App/Page/Component definition (data + handlers)
//! - [`Instrumenter`]: Wraps lifecycle hooks and methods with telemetry shims
//! - [`InterceptingFactory`]: Registration interceptor calling through to the
//!   host's own factory
//! - [`NetworkTap`]: Request primitive wrapper reporting request durations
//!
//! # Interception
//!
//! Every recognized hook and in-scope method is replaced by a shim that
//! reports to a [`TelemetrySink`](beacon_core::TelemetrySink) and then calls
//! the original handler with the same receiver and arguments. Results and
//! errors from the original are returned untouched.
//!
//! # Example
//!
//! ```ignore
//! use beacon_host::{Definition, InterceptingFactory, Instrumenter, Registrar};
//! use beacon_core::{ConstructKind, LifecycleHook};
//!
//! let pages = InterceptingFactory::new(
//!     ConstructKind::Page,
//!     host_page_factory,
//!     Instrumenter::new(sink),
//!     Arc::new(Registrar::new()),
//! );
//!
//! pages.register(
//!     Definition::page("pages/index/index")
//!         .with_hook(LifecycleHook::OnLoad, |page, args| Ok(Value::Null)),
//! )?;
//! ```

pub mod definition;
pub mod error;
pub mod instrument;
pub mod network;
pub mod registrar;

// Re-export main types
pub use definition::{CallError, CallResult, Definition, Handler, MethodScope};
pub use error::{HostError, HostResult};
pub use instrument::{Instrumenter, TAP_EVENT_TYPE};
pub use network::NetworkTap;
pub use registrar::{ConstructFactory, InterceptingFactory, RegisteredConstruct, Registrar};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::definition::{CallResult, Definition};
    pub use crate::error::{HostError, HostResult};
    pub use crate::registrar::{ConstructFactory, InterceptingFactory};
}
