//! Delivery of signed payloads.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use beacon_core::{RequestOptions, RequestPrimitive};

use crate::envelope::SignedPayload;
use crate::error::TransportError;

/// Result of a single submission.
pub type TransportOutcome = Result<(), TransportError>;

/// Called exactly once with the outcome of a submission.
pub type Completion = Box<dyn FnOnce(TransportOutcome) + Send>;

/// Ships signed payloads to the collection endpoint.
///
/// `completion` may run inside `submit` or at any later point. Dropping it
/// without calling it counts as a failure.
pub trait Transport: Send + Sync {
    /// Submit a payload.
    fn submit(&self, endpoint: &str, payload: SignedPayload, completion: Completion);
}

/// A [`Transport`] over the host's request primitive.
///
/// Payloads are POSTed as JSON. `success` or `fail` decides the outcome,
/// which is handed to the completion from `complete`.
pub struct RequestTransport<R> {
    primitive: R,
}

impl<R: RequestPrimitive> RequestTransport<R> {
    /// Wrap a request primitive.
    pub fn new(primitive: R) -> Self {
        Self { primitive }
    }

    /// The wrapped primitive.
    pub fn primitive(&self) -> &R {
        &self.primitive
    }
}

impl<R: RequestPrimitive> Transport for RequestTransport<R> {
    fn submit(&self, endpoint: &str, payload: SignedPayload, completion: Completion) {
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(e) => {
                completion(Err(TransportError::Failed(e.to_string())));
                return;
            }
        };

        let outcome: Arc<Mutex<Option<TransportOutcome>>> = Arc::new(Mutex::new(None));
        let (on_success, on_fail, on_complete) =
            (Arc::clone(&outcome), Arc::clone(&outcome), outcome);

        let options = RequestOptions::new(endpoint, "POST", body)
            .on_success(move |_| {
                *on_success.lock() = Some(Ok(()));
            })
            .on_fail(move |err| {
                *on_fail.lock() = Some(Err(TransportError::Failed(describe_failure(&err))));
            })
            .on_complete(move |_| {
                let outcome = on_complete.lock().take().unwrap_or_else(|| {
                    Err(TransportError::Failed(
                        "request completed without success or fail".to_string(),
                    ))
                });
                completion(outcome);
            });

        trace!(endpoint = %endpoint, records = payload.len(), "Submitting payload");
        let _handle = self.primitive.request(options);
    }
}

impl<R> std::fmt::Debug for RequestTransport<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTransport").finish_non_exhaustive()
    }
}

/// Host failure objects carry their message in `errMsg`.
fn describe_failure(err: &Value) -> String {
    err.get("errMsg")
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| err.to_string())
}
