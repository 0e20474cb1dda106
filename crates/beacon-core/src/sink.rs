//! Destination for telemetry events.

use parking_lot::RwLock;

use crate::event::TelemetryEvent;

/// Receives events from instrumentation.
///
/// Implementations must not call back into instrumented host code.
pub trait TelemetrySink: Send + Sync {
    /// Record an event.
    fn track(&self, event: TelemetryEvent);

    /// Ask for buffered events to be shipped.
    fn request_flush(&self);
}

/// A sink that keeps everything it receives, for tests and inspection.
pub struct CollectingSink {
    events: RwLock<Vec<TelemetryEvent>>,
    flush_requests: RwLock<usize>,
    max_events: usize,
}

impl CollectingSink {
    /// Create a sink keeping at most `max_events` events.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            flush_requests: RwLock::new(0),
            max_events,
        }
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.read().clone()
    }

    /// Number of flush requests seen.
    pub fn flush_requests(&self) -> usize {
        *self.flush_requests.read()
    }

    /// Clear collected events and flush requests.
    pub fn clear(&self) {
        self.events.write().clear();
        *self.flush_requests.write() = 0;
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl TelemetrySink for CollectingSink {
    fn track(&self, event: TelemetryEvent) {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push(event);
        }
    }

    fn request_flush(&self) {
        *self.flush_requests.write() += 1;
    }
}

impl std::fmt::Debug for CollectingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectingSink")
            .field("events", &self.len())
            .field("flush_requests", &self.flush_requests())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ConstructKind, LifecycleHook};

    fn lifecycle(hook: LifecycleHook) -> TelemetryEvent {
        TelemetryEvent::Lifecycle {
            owner: ConstructKind::Page,
            hook,
            identifier: "pages/index/index".to_string(),
        }
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new(100);
        sink.track(lifecycle(LifecycleHook::OnLoad));
        sink.request_flush();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.flush_requests(), 1);
        assert_eq!(sink.events()[0], lifecycle(LifecycleHook::OnLoad));

        sink.clear();
        assert!(sink.is_empty());
        assert_eq!(sink.flush_requests(), 0);
    }

    #[test]
    fn test_collecting_sink_max_events() {
        let sink = CollectingSink::new(2);
        for _ in 0..5 {
            sink.track(lifecycle(LifecycleHook::OnShow));
        }
        assert_eq!(sink.len(), 2);
    }
}
