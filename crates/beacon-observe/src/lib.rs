//! Beacon Delivery
//!
//! This crate turns telemetry events into signed batches and ships them to
//! the collection endpoint, including:
//!
//! - [`Encoder`]: Builds wire [`EventRecord`]s from telemetry events
//! - [`FlushEngine`]: Buffer with a single in-flight send and front re-queueing
//! - [`SignedPayload`]: Envelope plus SHA-512 signature
//! - [`Transport`]: Delivery seam, with [`RequestTransport`] over the host
//!   request primitive
//! - [`PerformanceBridge`]: Forwards host performance entries
//! - [`Pipeline`]: Encoder and engine behind a
//!   [`TelemetrySink`](beacon_core::TelemetrySink)
//!
//! # Delivery
//!
//! ```ignore
//! use beacon_observe::{Encoder, FlushEngine, Pipeline, RequestTransport};
//!
//! let engine = FlushEngine::new(&config, Arc::new(RequestTransport::new(host)), clock.clone());
//! let pipeline = Pipeline::new(Encoder::new(storage, "userId", trace_id, clock), engine);
//!
//! pipeline.track(event);
//! match pipeline.flush() {
//!     FlushDecision::Dispatched { records } => println!("sent {records}"),
//!     other => println!("{other:?}"),
//! }
//! ```

pub mod encoder;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod performance;
pub mod pipeline;
pub mod record;
pub mod transport;

// Re-export main types
pub use encoder::{Encoder, format_number};
pub use engine::{EngineStats, FlushDecision, FlushEngine};
pub use envelope::{Envelope, LOG_TOPIC, SIGNING_SALT, SignedPayload, sign};
pub use error::{ObserveError, ObserveResult, TransportError};
pub use performance::{OBSERVED_ENTRY_TYPES, PerformanceBridge};
pub use pipeline::Pipeline;
pub use record::{EventRecord, Field, keys};
pub use transport::{Completion, RequestTransport, Transport, TransportOutcome};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::engine::{EngineStats, FlushDecision, FlushEngine};
    pub use crate::envelope::SignedPayload;
    pub use crate::pipeline::Pipeline;
    pub use crate::record::EventRecord;
    pub use crate::transport::{Completion, Transport, TransportOutcome};
}
