//! Timing of outbound requests.

use std::sync::Arc;

use tracing::trace;

use beacon_core::{Clock, RequestOptions, RequestPrimitive, TelemetryEvent, TelemetrySink};

/// Wraps the host's request primitive and reports the duration of every call.
///
/// `success` and `fail` are passed through untouched. `complete` is wrapped
/// so the request event is emitted before the caller's own `complete` runs.
/// The handle from the wrapped primitive is returned as-is.
pub struct NetworkTap<R> {
    inner: R,
    sink: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
}

impl<R: RequestPrimitive> NetworkTap<R> {
    /// Wrap a request primitive.
    pub fn new(inner: R, sink: Arc<dyn TelemetrySink>, clock: Arc<dyn Clock>) -> Self {
        Self { inner, sink, clock }
    }

    /// The wrapped primitive.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Remove the tap, returning the wrapped primitive.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: RequestPrimitive> RequestPrimitive for NetworkTap<R> {
    type Handle = R::Handle;

    fn request(&self, mut options: RequestOptions) -> Self::Handle {
        let started = self.clock.now_millis();
        let url = options.url.clone();
        let original_complete = options.complete.take();
        let sink = Arc::clone(&self.sink);
        let clock = Arc::clone(&self.clock);

        options.complete = Some(Box::new(move |response| {
            let duration_ms = clock.now_millis().saturating_sub(started);
            trace!(url = %url, duration_ms, "Request completed");
            sink.track(TelemetryEvent::ApiRequest {
                path: url,
                duration_ms,
            });
            if let Some(complete) = original_complete {
                complete(response);
            }
        }));

        self.inner.request(options)
    }
}

impl<R> std::fmt::Debug for NetworkTap<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkTap").finish_non_exhaustive()
    }
}
