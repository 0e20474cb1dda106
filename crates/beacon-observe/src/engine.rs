//! Buffering and the single-flight send protocol.
//!
//! ```text
//!            request_flush (buffer non-empty)
//!   ┌──────┐ ─────────────────────────────────▶ ┌─────────┐
//!   │ Idle │                                    │ Sending │
//!   └──────┘ ◀───────────────────────────────── └─────────┘
//!             InFlight dropped (any outcome)
//! ```
//!
//! While a batch is in flight new records keep accumulating in the buffer.
//! A failed batch is put back in front of them.

use std::mem;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use beacon_core::{Clock, DeliveryMode, TrackerConfig};

use crate::envelope::{Envelope, SignedPayload};
use crate::error::{ObserveError, TransportError};
use crate::record::EventRecord;
use crate::transport::{Transport, TransportOutcome};

/// Counters describing engine activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Records accepted by `enqueue`.
    pub records_enqueued: u64,
    /// Batches acknowledged by the transport.
    pub batches_sent: u64,
    /// Batches that failed and were put back.
    pub batches_failed: u64,
    /// Batches written to the log in local-only mode.
    pub batches_logged: u64,
    /// Records acknowledged by the transport.
    pub records_delivered: u64,
    /// Records put back after a failed attempt.
    pub records_requeued: u64,
    /// Records discarded in local-only mode.
    pub records_discarded: u64,
    /// Reason of the most recent failed attempt.
    pub last_failure: Option<String>,
}

/// What a call to [`FlushEngine::request_flush`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// Nothing was buffered.
    Empty,
    /// A batch is already in flight.
    Busy,
    /// The batch was handed to the transport.
    Dispatched {
        /// Records in the batch.
        records: usize,
    },
    /// Local-only mode: the payload was logged and the batch discarded.
    LoggedLocally {
        /// Records in the batch.
        records: usize,
    },
    /// The batch could not be sent and went back into the buffer.
    Requeued {
        /// Records in the batch.
        records: usize,
    },
}

#[derive(Default)]
struct State {
    buffer: Vec<EventRecord>,
    sending: bool,
    stats: EngineStats,
}

/// Owns the buffer and ships it in signed batches.
pub struct FlushEngine {
    state: Arc<Mutex<State>>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    endpoint: RwLock<Option<String>>,
    source: String,
    mode: DeliveryMode,
}

impl FlushEngine {
    /// Create an engine for `config`.
    pub fn new(config: &TrackerConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            transport,
            clock,
            endpoint: RwLock::new(config.server_url.clone()),
            source: config.app_id.clone(),
            mode: config.delivery_mode(),
        }
    }

    /// Append a record. Valid while a batch is in flight.
    pub fn enqueue(&self, record: EventRecord) {
        let mut state = self.state.lock();
        state.buffer.push(record);
        state.stats.records_enqueued += 1;
        trace!(buffered = state.buffer.len(), "Enqueued record");
    }

    /// Ship the buffer if idle and non-empty.
    pub fn request_flush(&self) -> FlushDecision {
        let batch = {
            let mut state = self.state.lock();
            if state.sending {
                debug!("Flush skipped, a batch is in flight");
                return FlushDecision::Busy;
            }
            if state.buffer.is_empty() {
                return FlushDecision::Empty;
            }
            state.sending = true;
            mem::take(&mut state.buffer)
        };

        let records = batch.len();
        let flight = InFlight::new(Arc::clone(&self.state), batch);
        let envelope = Envelope::new(self.source.as_str(), flight.batch.clone());

        let payload = match SignedPayload::new(envelope, self.clock.unix_seconds()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, records, "Failed to sign batch");
                flight.fail(e);
                return FlushDecision::Requeued { records };
            }
        };

        if self.mode == DeliveryMode::LocalOnly {
            match payload.to_json() {
                Ok(body) => info!(payload = %body, "Tracking data"),
                Err(e) => info!(error = %e, records, "Tracking data"),
            }
            flight.discard();
            return FlushDecision::LoggedLocally { records };
        }

        let Some(endpoint) = self.endpoint() else {
            let reason = ObserveError::MissingEndpoint;
            error!(records, "{}", reason);
            flight.fail(reason);
            return FlushDecision::Requeued { records };
        };

        debug!(endpoint = %endpoint, records, timestamp = payload.timestamp, "Dispatching batch");
        self.transport.submit(
            &endpoint,
            payload,
            Box::new(move |outcome| flight.finish(outcome)),
        );
        FlushDecision::Dispatched { records }
    }

    /// Collection endpoint in effect.
    pub fn endpoint(&self) -> Option<String> {
        self.endpoint.read().clone()
    }

    /// Replace the collection endpoint. Records held back for lack of one
    /// go out on the next flush.
    pub fn set_endpoint(&self, endpoint: Option<String>) {
        debug!(endpoint = ?endpoint, "Endpoint updated");
        *self.endpoint.write() = endpoint;
    }

    /// Number of buffered records.
    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Check if a batch is in flight.
    pub fn is_sending(&self) -> bool {
        self.state.lock().sending
    }

    /// Copy of the buffered records.
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.state.lock().buffer.clone()
    }

    /// Activity counters.
    pub fn stats(&self) -> EngineStats {
        self.state.lock().stats.clone()
    }

    /// Delivery mode in effect.
    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }
}

impl std::fmt::Debug for FlushEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FlushEngine")
            .field("endpoint", &*self.endpoint.read())
            .field("source", &self.source)
            .field("mode", &self.mode)
            .field("buffered", &state.buffer.len())
            .field("sending", &state.sending)
            .finish()
    }
}

enum Resolution {
    Delivered,
    Discarded,
    Failed(ObserveError),
}

/// Holds the in-flight flag for one batch.
///
/// Dropping it is the only way back to idle. Without an explicit resolution
/// the batch is treated as failed, which covers a transport that drops or
/// unwinds through its completion.
struct InFlight {
    state: Arc<Mutex<State>>,
    batch: Vec<EventRecord>,
    resolution: Option<Resolution>,
}

impl InFlight {
    fn new(state: Arc<Mutex<State>>, batch: Vec<EventRecord>) -> Self {
        Self {
            state,
            batch,
            resolution: None,
        }
    }

    fn finish(mut self, outcome: TransportOutcome) {
        self.resolution = Some(match outcome {
            Ok(()) => Resolution::Delivered,
            Err(e) => Resolution::Failed(e.into()),
        });
    }

    fn fail(mut self, reason: ObserveError) {
        self.resolution = Some(Resolution::Failed(reason));
    }

    fn discard(mut self) {
        self.resolution = Some(Resolution::Discarded);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let batch = mem::take(&mut self.batch);
        let records = batch.len();
        let resolution = self
            .resolution
            .take()
            .unwrap_or_else(|| Resolution::Failed(TransportError::Abandoned.into()));

        {
            let mut state = self.state.lock();
            match &resolution {
                Resolution::Delivered => {
                    state.stats.batches_sent += 1;
                    state.stats.records_delivered += records as u64;
                }
                Resolution::Discarded => {
                    state.stats.batches_logged += 1;
                    state.stats.records_discarded += records as u64;
                }
                Resolution::Failed(reason) => {
                    let newer = mem::replace(&mut state.buffer, batch);
                    state.buffer.extend(newer);
                    state.stats.batches_failed += 1;
                    state.stats.records_requeued += records as u64;
                    state.stats.last_failure = Some(reason.to_string());
                }
            }
            state.sending = false;
        }

        match resolution {
            Resolution::Delivered => info!(records, "Tracking data sent successfully"),
            Resolution::Discarded => {}
            Resolution::Failed(reason) => {
                warn!(records, reason = %reason, "Failed to send tracking data, batch requeued")
            }
        }
    }
}
