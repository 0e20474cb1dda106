//! Collection of host performance entries.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use beacon_core::{
    PerformanceEntry, PerformanceObserver, PerformanceService, TelemetryEvent, TelemetrySink,
};

/// Entry types requested from the performance service.
pub const OBSERVED_ENTRY_TYPES: [&str; 2] = ["render", "navigation"];

/// Subscribes to the performance service and forwards entries to a sink.
pub struct PerformanceBridge {
    sink: Arc<dyn TelemetrySink>,
    observer: Mutex<Option<Box<dyn PerformanceObserver>>>,
}

impl PerformanceBridge {
    /// Create a bridge reporting to `sink`.
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            sink,
            observer: Mutex::new(None),
        }
    }

    /// Start collecting. Returns `false` if already collecting.
    ///
    /// A synthetic `App`/`launch` entry stamped with `service.now()` is
    /// recorded once the observer is in place.
    pub fn collect(&self, service: &dyn PerformanceService) -> bool {
        {
            let mut slot = self.observer.lock();
            if slot.is_some() {
                return false;
            }

            let sink = Arc::clone(&self.sink);
            let observer = service.create_observer(Box::new(move |entries| {
                for entry in entries {
                    sink.track(TelemetryEvent::Performance(entry));
                }
            }));
            observer.observe(&OBSERVED_ENTRY_TYPES);
            *slot = Some(observer);
        }

        self.sink
            .track(TelemetryEvent::Performance(PerformanceEntry::launch(service.now())));
        debug!(entry_types = ?OBSERVED_ENTRY_TYPES, "Performance collection started");
        true
    }

    /// Check if collection has started.
    pub fn is_collecting(&self) -> bool {
        self.observer.lock().is_some()
    }
}

impl std::fmt::Debug for PerformanceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceBridge")
            .field("collecting", &self.is_collecting())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{CollectingSink, PerformanceCallback};

    /// Service whose observers can be fed entries by the test.
    #[derive(Default)]
    struct FakeService {
        callbacks: Arc<Mutex<Vec<PerformanceCallback>>>,
        observed: Arc<Mutex<Vec<Vec<String>>>>,
    }

    struct FakeObserver {
        observed: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl PerformanceObserver for FakeObserver {
        fn observe(&self, entry_types: &[&str]) {
            self.observed
                .lock()
                .push(entry_types.iter().map(|t| t.to_string()).collect());
        }
    }

    impl PerformanceService for FakeService {
        fn now(&self) -> f64 {
            512.5
        }

        fn create_observer(&self, callback: PerformanceCallback) -> Box<dyn PerformanceObserver> {
            self.callbacks.lock().push(callback);
            Box::new(FakeObserver {
                observed: Arc::clone(&self.observed),
            })
        }
    }

    impl FakeService {
        fn emit(&self, entries: Vec<PerformanceEntry>) {
            for callback in self.callbacks.lock().iter() {
                callback(entries.clone());
            }
        }
    }

    fn render(name: &str) -> PerformanceEntry {
        PerformanceEntry {
            entry_type: "render".to_string(),
            name: name.to_string(),
            path: "pages/index/index".to_string(),
            referrer_path: String::new(),
            start_time: 100.0,
            duration: 20.0,
        }
    }

    #[test]
    fn test_collect_records_launch_and_entries() {
        let sink = Arc::new(CollectingSink::new(100));
        let bridge = PerformanceBridge::new(Arc::clone(&sink) as Arc<dyn TelemetrySink>);
        let service = FakeService::default();

        assert!(bridge.collect(&service));
        assert_eq!(
            *service.observed.lock(),
            vec![vec!["render".to_string(), "navigation".to_string()]]
        );
        assert_eq!(
            sink.events(),
            vec![TelemetryEvent::Performance(PerformanceEntry::launch(512.5))]
        );

        service.emit(vec![render("firstRender"), render("secondRender")]);
        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.events()[1],
            TelemetryEvent::Performance(render("firstRender"))
        );
    }

    #[test]
    fn test_collect_subscribes_once() {
        let sink = Arc::new(CollectingSink::new(100));
        let bridge = PerformanceBridge::new(Arc::clone(&sink) as Arc<dyn TelemetrySink>);
        let service = FakeService::default();

        assert!(bridge.collect(&service));
        assert!(!bridge.collect(&service));
        assert!(bridge.is_collecting());
        assert_eq!(service.callbacks.lock().len(), 1);
        assert_eq!(sink.len(), 1);
    }
}
