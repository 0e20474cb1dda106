//! Encoder and flush engine joined into a sink.

use tracing::debug;

use beacon_core::{TelemetryEvent, TelemetrySink};

use crate::encoder::Encoder;
use crate::engine::{EngineStats, FlushDecision, FlushEngine};

/// Encodes events in call order and buffers them for delivery.
#[derive(Debug)]
pub struct Pipeline {
    encoder: Encoder,
    engine: FlushEngine,
}

impl Pipeline {
    /// Join an encoder and an engine.
    pub fn new(encoder: Encoder, engine: FlushEngine) -> Self {
        Self { encoder, engine }
    }

    /// Flush and report what happened.
    pub fn flush(&self) -> FlushDecision {
        self.engine.request_flush()
    }

    /// Activity counters.
    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// The encoder.
    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// The engine.
    pub fn engine(&self) -> &FlushEngine {
        &self.engine
    }
}

impl TelemetrySink for Pipeline {
    fn track(&self, event: TelemetryEvent) {
        let record = self.encoder.encode(&event);
        self.engine.enqueue(record);
    }

    fn request_flush(&self) {
        let decision = self.flush();
        debug!(?decision, "Flush requested");
    }
}
