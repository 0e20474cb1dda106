//! # Beacon - Behavioral Telemetry Client
//!
//! Beacon instruments a mini-program style host application: it wraps the
//! App/Page/Component registration path and the outbound request primitive,
//! turns lifecycle hooks, taps, request timings, performance entries and
//! application errors into uniform records, and ships them in signed batches.
//!
//! ## Features
//!
//! - **Transparent**: Original hooks and methods always run, with the same
//!   receiver, arguments and result
//! - **No silent loss**: Failed batches go back in front of the buffer
//! - **Single flight**: At most one batch is in flight at a time
//! - **Embeddable**: Every host service is a trait with an in-memory double
//!
//! ## Quick Start
//!
//! ```ignore
//! use beacon::prelude::*;
//!
//! let runtime = Beacon::builder()
//!     .with_app_id("hotel-app")
//!     .with_send_log(true)
//!     .with_storage(host_storage)
//!     .with_request_primitive(host_request)
//!     .build()?;
//!
//! // Register through the interceptors instead of the host constructors
//! let pages = runtime.intercept_page(host_page_factory);
//! pages.register(Definition::page("pages/index/index").with_hook(LifecycleHook::OnLoad, on_load))?;
//!
//! // Time every request the application makes
//! let request = runtime.tap_requests(host_request);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Host Application                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                  beacon (facade runtime)                │
//! │                  ┌──────────────────┐                   │
//! │                  │  Beacon Builder  │                   │
//! │                  └────────┬─────────┘                   │
//! │                           │                             │
//! │  ┌─────────────┬──────────┴──────────┬────────────────┐ │
//! │  │ beacon-core │ beacon-host         │ beacon-observe │ │
//! │  │ (events,    │ (interceptors,      │ (encoder,      │ │
//! │  │  config)    │  network tap)       │  flush engine) │ │
//! │  └─────────────┴─────────────────────┴────────────────┘ │
//! ├─────────────────────────────────────────────────────────┤
//! │       Host services: storage, request, performance      │
//! └─────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::info;

use beacon_core::{
    Clock, ConfigError, ConstructKind, IdGenerator, IdentityStore, MemoryStorage,
    PerformanceService, RandomIdGenerator, RequestPrimitive, Storage, SystemClock, TelemetryEvent,
    TelemetrySink, TrackerConfig,
};
use beacon_host::{ConstructFactory, Instrumenter, InterceptingFactory, NetworkTap, Registrar};
use beacon_observe::{
    Completion, Encoder, EngineStats, EventRecord, FlushDecision, FlushEngine, PerformanceBridge,
    Pipeline, RequestTransport, SignedPayload, Transport, TransportError,
};

// Re-export from sub-crates
pub use beacon_core;
pub use beacon_host;
pub use beacon_observe;

/// Main entry point for Beacon.
pub struct Beacon;

impl Beacon {
    /// Create a new Beacon runtime builder.
    pub fn builder() -> BeaconBuilder {
        BeaconBuilder::new()
    }
}

/// Builder for configuring the Beacon runtime.
pub struct BeaconBuilder {
    config: TrackerConfig,
    storage: Option<Arc<dyn Storage>>,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn Transport>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
}

impl BeaconBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
            storage: None,
            clock: None,
            transport: None,
            id_generator: None,
        }
    }

    // Configuration

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the envelope source.
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config = self.config.with_app_id(app_id);
        self
    }

    /// Set the collection endpoint.
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.with_server_url(url);
        self
    }

    /// Enable or disable posting batches.
    pub fn with_send_log(mut self, enabled: bool) -> Self {
        self.config = self.config.with_send_log(enabled);
        self
    }

    // Host services

    /// Use the host's key/value storage. Defaults to in-memory storage.
    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Use a specific clock. Defaults to the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Deliver batches through `transport`.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Deliver batches through the host request primitive.
    ///
    /// Deliveries use the primitive directly, so they are not themselves
    /// reported as request events.
    pub fn with_request_primitive<R: RequestPrimitive + 'static>(self, primitive: R) -> Self {
        self.with_transport(Arc::new(RequestTransport::new(primitive)))
    }

    /// Use a specific identity generator. Defaults to random v4 UUIDs.
    pub fn with_id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Build the runtime.
    pub fn build(self) -> Result<BeaconRuntime, BeaconError> {
        self.config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None if self.config.send_log => return Err(BeaconError::MissingTransport),
            None => Arc::new(Unconnected),
        };
        let storage: Arc<dyn Storage> = match self.storage {
            Some(storage) => storage,
            None => Arc::new(MemoryStorage::new()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };
        let generator: Arc<dyn IdGenerator> = match self.id_generator {
            Some(generator) => generator,
            None => Arc::new(RandomIdGenerator),
        };

        let identity = IdentityStore::resolve(storage.as_ref(), generator.as_ref());

        let encoder = Encoder::new(
            storage,
            self.config.uid_storage_key.as_str(),
            identity.as_str(),
            Arc::clone(&clock),
        );
        let engine = FlushEngine::new(&self.config, transport, Arc::clone(&clock));
        let pipeline = Arc::new(Pipeline::new(encoder, engine));
        let sink: Arc<dyn TelemetrySink> = Arc::clone(&pipeline) as Arc<dyn TelemetrySink>;

        info!(
            app_id = %self.config.app_id,
            identity = %identity,
            mode = ?self.config.delivery_mode(),
            "Beacon runtime ready"
        );

        Ok(BeaconRuntime {
            config: self.config,
            identity,
            pipeline,
            instrumenter: Instrumenter::new(Arc::clone(&sink)),
            registrar: Arc::new(Registrar::new()),
            performance: PerformanceBridge::new(Arc::clone(&sink)),
            sink,
            clock,
        })
    }
}

impl Default for BeaconBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured Beacon runtime.
pub struct BeaconRuntime {
    config: TrackerConfig,
    identity: String,
    pipeline: Arc<Pipeline>,
    sink: Arc<dyn TelemetrySink>,
    instrumenter: Instrumenter,
    registrar: Arc<Registrar>,
    performance: PerformanceBridge,
    clock: Arc<dyn Clock>,
}

impl BeaconRuntime {
    /// Persistent client identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Configuration the runtime was built with.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Point delivery at a new collection endpoint.
    ///
    /// Records held back because no endpoint was configured are sent on the
    /// next flush.
    pub fn set_server_url(&self, url: impl Into<String>) -> Result<(), BeaconError> {
        let config = self.config.clone().with_server_url(url);
        config.validate()?;
        self.pipeline.engine().set_endpoint(config.server_url);
        Ok(())
    }

    /// The sink every interceptor reports to.
    pub fn sink(&self) -> Arc<dyn TelemetrySink> {
        Arc::clone(&self.sink)
    }

    /// Registrations seen by the interceptors.
    pub fn registrar(&self) -> &Arc<Registrar> {
        &self.registrar
    }

    /// Interceptor for the host's App constructor.
    pub fn intercept_app<I: 'static>(
        &self,
        next: Arc<dyn ConstructFactory<I>>,
    ) -> InterceptingFactory<I> {
        self.intercept(ConstructKind::App, next)
    }

    /// Interceptor for the host's Page constructor.
    pub fn intercept_page<I: 'static>(
        &self,
        next: Arc<dyn ConstructFactory<I>>,
    ) -> InterceptingFactory<I> {
        self.intercept(ConstructKind::Page, next)
    }

    /// Interceptor for the host's Component constructor.
    pub fn intercept_component<I: 'static>(
        &self,
        next: Arc<dyn ConstructFactory<I>>,
    ) -> InterceptingFactory<I> {
        self.intercept(ConstructKind::Component, next)
    }

    fn intercept<I: 'static>(
        &self,
        kind: ConstructKind,
        next: Arc<dyn ConstructFactory<I>>,
    ) -> InterceptingFactory<I> {
        InterceptingFactory::new(
            kind,
            next,
            self.instrumenter.clone(),
            Arc::clone(&self.registrar),
        )
    }

    /// Wrap the host's request primitive so every call is timed.
    pub fn tap_requests<R: RequestPrimitive>(&self, primitive: R) -> NetworkTap<R> {
        NetworkTap::new(primitive, Arc::clone(&self.sink), Arc::clone(&self.clock))
    }

    /// Start forwarding performance entries. Returns `false` if already started.
    pub fn collect_performance(&self, service: &dyn PerformanceService) -> bool {
        self.performance.collect(service)
    }

    /// Record an event directly.
    pub fn track(&self, event: TelemetryEvent) {
        self.sink.track(event);
    }

    /// Ship buffered records.
    pub fn flush(&self) -> FlushDecision {
        self.pipeline.flush()
    }

    /// Delivery counters.
    pub fn stats(&self) -> EngineStats {
        self.pipeline.stats()
    }

    /// Number of records waiting for delivery.
    pub fn buffered(&self) -> usize {
        self.pipeline.engine().buffered()
    }

    /// Copy of the records waiting for delivery.
    pub fn pending(&self) -> Vec<EventRecord> {
        self.pipeline.engine().snapshot()
    }
}

impl std::fmt::Debug for BeaconRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeaconRuntime")
            .field("config", &self.config)
            .field("identity", &self.identity)
            .field("registered", &self.registrar.len())
            .field("buffered", &self.buffered())
            .finish()
    }
}

/// Stand-in transport for local-only runtimes. Any submission fails.
struct Unconnected;

impl Transport for Unconnected {
    fn submit(&self, _endpoint: &str, _payload: SignedPayload, completion: Completion) {
        completion(Err(TransportError::Failed(
            "no transport configured".to_string(),
        )));
    }
}

/// Errors from the Beacon runtime.
#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote delivery is enabled but nothing can deliver.
    #[error("sendLog is enabled but no transport was configured")]
    MissingTransport,
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{Beacon, BeaconBuilder, BeaconError, BeaconRuntime};

    // Core types
    pub use beacon_core::{
        Clock, ConstructKind, LifecycleHook, LogKind, MemoryStorage, PerformanceEntry,
        RequestOptions, RequestPrimitive, Storage, TelemetryEvent, TelemetrySink, TrackerConfig,
    };

    // Host types
    pub use beacon_host::{ConstructFactory, Definition, HostError, HostResult};

    // Delivery types
    pub use beacon_observe::{
        EngineStats, EventRecord, FlushDecision, SignedPayload, Transport, TransportOutcome,
    };

    // Common std types
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{IDENTITY_STORAGE_KEY, LifecycleHook, ManualClock, RequestOptions};
    use beacon_host::{Definition, HostResult};
    use beacon_observe::{TransportOutcome, keys};
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    struct FixedId(&'static str);

    impl IdGenerator for FixedId {
        fn generate(&self) -> String {
            self.0.to_string()
        }
    }

    /// Transport that parks completions until the test resolves them.
    #[derive(Default)]
    struct ParkedTransport {
        payloads: Mutex<Vec<SignedPayload>>,
        pending: Mutex<Vec<Completion>>,
    }

    impl ParkedTransport {
        fn resolve(&self, outcome: TransportOutcome) {
            let completion = self.pending.lock().remove(0);
            completion(outcome);
        }
    }

    impl Transport for ParkedTransport {
        fn submit(&self, _: &str, payload: SignedPayload, completion: Completion) {
            self.payloads.lock().push(payload);
            self.pending.lock().push(completion);
        }
    }

    /// Host constructor that keeps what it was given.
    struct HostRegistry<I> {
        definitions: Mutex<Vec<Definition<I>>>,
    }

    impl<I> HostRegistry<I> {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                definitions: Mutex::new(Vec::new()),
            })
        }
    }

    impl<I> ConstructFactory<I> for HostRegistry<I> {
        fn register(&self, definition: Definition<I>) -> HostResult<()> {
            self.definitions.lock().push(definition);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Instance {
        loads: u32,
        taps: u32,
    }

    fn runtime() -> (Arc<MemoryStorage>, Arc<ParkedTransport>, BeaconRuntime) {
        let storage = Arc::new(MemoryStorage::new());
        let transport = Arc::new(ParkedTransport::default());
        let runtime = Beacon::builder()
            .with_app_id("hotel-app")
            .with_server_url("https://collector.example.com/logs")
            .with_send_log(true)
            .with_storage(Arc::clone(&storage) as Arc<dyn Storage>)
            .with_clock(Arc::new(ManualClock::at_seconds(1_700_000_000)))
            .with_transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .with_id_generator(Arc::new(FixedId("trace-fixed")))
            .build()
            .unwrap();
        (storage, transport, runtime)
    }

    fn descriptions(records: &[EventRecord]) -> Vec<String> {
        records
            .iter()
            .filter_map(|record| record.description().map(String::from))
            .collect()
    }

    #[test]
    fn test_identity_is_persisted() {
        let (storage, _, runtime) = runtime();
        assert_eq!(runtime.identity(), "trace-fixed");
        assert_eq!(
            storage.get(IDENTITY_STORAGE_KEY),
            Some("trace-fixed".to_string())
        );

        let again = Beacon::builder()
            .with_storage(Arc::clone(&storage) as Arc<dyn Storage>)
            .build()
            .unwrap();
        assert_eq!(again.identity(), "trace-fixed");
    }

    #[test]
    fn test_page_session_end_to_end() {
        let (storage, transport, runtime) = runtime();
        storage.set("userId", "member-1".to_string());

        let host = HostRegistry::<Instance>::new();
        let pages = runtime.intercept_page(Arc::clone(&host) as Arc<dyn ConstructFactory<Instance>>);
        pages
            .register(
                Definition::page("pages/room/room")
                    .with_data("rooms", json!([]))
                    .with_hook(LifecycleHook::OnLoad, |page: &mut Instance, _: &[Value]| {
                        page.loads += 1;
                        Ok(Value::Null)
                    })
                    .with_function("book", |page: &mut Instance, _: &[Value]| {
                        page.taps += 1;
                        Ok(json!("booked"))
                    }),
            )
            .unwrap();

        let definitions = host.definitions.lock();
        let page = &definitions[0];
        let mut instance = Instance::default();

        page.invoke_hook(LifecycleHook::OnLoad, &mut instance, &[json!({"id": "7"})])
            .unwrap();
        let result = page
            .call("book", &mut instance, &[json!({"type": "tap"})])
            .unwrap();
        assert_eq!(result, json!("booked"));
        page.invoke_hook(LifecycleHook::OnUnload, &mut instance, &[])
            .unwrap();

        assert_eq!((instance.loads, instance.taps), (1, 1));

        let payloads = transport.payloads.lock().clone();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].verify());
        assert_eq!(payloads[0].data.source, "hotel-app");
        assert_eq!(
            descriptions(&payloads[0].data.logs),
            vec![
                "[Page] - onLoad - pages/room/room",
                "[tap] - pages/room/room - book",
                "[Page] - onUnload - pages/room/room",
            ]
        );
        let first = &payloads[0].data.logs[0];
        assert_eq!(first.get(keys::USER_ID), Some("member-1"));
        assert_eq!(first.get(keys::TRACE_ID), Some("trace-fixed"));
        assert_eq!(first.time, 1_700_000_000);

        transport.resolve(Ok(()));
        assert_eq!(runtime.stats().records_delivered, 3);
        assert_eq!(runtime.buffered(), 0);
    }

    #[test]
    fn test_failed_send_is_retried_with_newer_records() {
        let (_, transport, runtime) = runtime();
        let host = HostRegistry::<Instance>::new();
        let app = runtime.intercept_app(Arc::clone(&host) as Arc<dyn ConstructFactory<Instance>>);
        app.register(Definition::app()).unwrap();

        let definitions = host.definitions.lock();
        let mut instance = Instance::default();
        definitions[0]
            .invoke_hook(LifecycleHook::OnLaunch, &mut instance, &[])
            .unwrap();
        definitions[0]
            .invoke_hook(LifecycleHook::OnShow, &mut instance, &[])
            .unwrap();
        assert_eq!(transport.payloads.lock().len(), 1);

        definitions[0]
            .invoke_hook(LifecycleHook::OnError, &mut instance, &[json!("TypeError: x is undefined")])
            .unwrap();
        transport.resolve(Err(TransportError::Failed("request:fail".to_string())));

        assert_eq!(
            descriptions(&runtime.pending()),
            vec![
                "[App] - onLaunch - ",
                "[App] - onShow - ",
                "[App] - onError - ",
                "\"TypeError: x is undefined\"",
            ]
        );
        assert_eq!(runtime.flush(), FlushDecision::Dispatched { records: 4 });
    }

    #[test]
    fn test_repeated_registration_reaches_host() {
        let (_, _, runtime) = runtime();
        let host = HostRegistry::<Instance>::new();
        let app = runtime.intercept_app(Arc::clone(&host) as Arc<dyn ConstructFactory<Instance>>);

        app.register(Definition::app()).unwrap();
        app.register(Definition::app()).unwrap();

        assert_eq!(host.definitions.lock().len(), 2);
        assert_eq!(runtime.registrar().len(), 1);
    }

    #[test]
    fn test_server_url_supplied_after_build() {
        let transport = Arc::new(ParkedTransport::default());
        let runtime = Beacon::builder()
            .with_config(TrackerConfig::new().with_app_id("hotel-app").without_endpoint())
            .with_send_log(true)
            .with_transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .build()
            .unwrap();

        runtime.track(TelemetryEvent::Error {
            payload: "{}".to_string(),
        });
        assert_eq!(runtime.flush(), FlushDecision::Requeued { records: 1 });
        assert!(matches!(
            runtime.set_server_url("ftp://nope"),
            Err(BeaconError::Config(_))
        ));

        runtime
            .set_server_url("https://collector.example.com/logs")
            .unwrap();
        assert_eq!(runtime.flush(), FlushDecision::Dispatched { records: 1 });
        assert_eq!(transport.payloads.lock().len(), 1);
    }

    #[test]
    fn test_request_tap_reports_duration() {
        struct EchoHost(Arc<ManualClock>);

        impl RequestPrimitive for EchoHost {
            type Handle = &'static str;

            fn request(&self, options: RequestOptions) -> Self::Handle {
                self.0.advance(250);
                if let Some(complete) = options.complete {
                    complete(Value::Null);
                }
                "task"
            }
        }

        let clock = Arc::new(ManualClock::at_seconds(1_700_000_000));
        let runtime = Beacon::builder()
            .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .build()
            .unwrap();
        let request = runtime.tap_requests(EchoHost(clock));

        let handle = request.request(RequestOptions::new(
            "https://api.example.com/hotels",
            "GET",
            Value::Null,
        ));

        assert_eq!(handle, "task");
        assert_eq!(
            descriptions(&runtime.pending()),
            vec!["TotalTime: 250ms"]
        );
    }

    #[test]
    fn test_local_only_runtime_needs_no_transport() {
        let runtime = Beacon::builder().with_app_id("dev").build().unwrap();
        runtime.track(TelemetryEvent::Error {
            payload: "{}".to_string(),
        });

        assert_eq!(runtime.flush(), FlushDecision::LoggedLocally { records: 1 });
        assert_eq!(runtime.buffered(), 0);
    }

    #[test]
    fn test_remote_runtime_requires_transport() {
        let result = Beacon::builder().with_send_log(true).build();
        assert!(matches!(result, Err(BeaconError::MissingTransport)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Beacon::builder().with_server_url("ftp://nope").build();
        assert!(matches!(result, Err(BeaconError::Config(_))));
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _runtime = Beacon::builder().build().unwrap();
    }
}
