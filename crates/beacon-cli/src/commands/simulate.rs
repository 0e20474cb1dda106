//! Simulate command - Drive an in-memory host through a session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use clap::Args;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use beacon::Beacon;
use beacon_core::{
    Clock, ConstructKind, LifecycleHook, ManualClock, MemoryStorage, PerformanceCallback,
    PerformanceEntry, PerformanceObserver, PerformanceService, RequestOptions, RequestPrimitive,
    Storage, SystemClock,
};
use beacon_host::{CallResult, ConstructFactory, Definition, HostResult, NetworkTap};
use beacon_observe::{
    Completion, EngineStats, SignedPayload, Transport, TransportError, keys,
};

use crate::OutputFormat;
use crate::commands::{ConfigSource, print_json};

/// Arguments for the simulate command.
///
/// Delivery always goes to an in-memory transport, whatever `sendLog` says.
#[derive(Args)]
pub struct SimulateArgs {
    /// Number of pages to visit
    #[arg(short, long, default_value = "3")]
    pub pages: u32,

    /// Make the first delivery fail to show re-queueing
    #[arg(long)]
    pub fail_first: bool,

    /// Request latency of the simulated network in milliseconds
    #[arg(long, default_value = "80")]
    pub latency: u64,
}

/// Per-page instance state.
#[derive(Debug, Default)]
struct Session {
    launched: bool,
    page_views: u32,
    bookings: u32,
}

/// One submission seen by the in-memory transport.
#[derive(Debug, Serialize)]
struct Attempt {
    attempt: usize,
    accepted: bool,
    endpoint: String,
    payload: SignedPayload,
}

/// Simulation summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulationReport {
    identity: String,
    registered: Vec<String>,
    attempts: Vec<Attempt>,
    stats: EngineStats,
    pending: usize,
}

/// Transport that accepts everything, optionally failing the first submission.
struct MemoryTransport {
    fail_first: bool,
    attempts: Mutex<Vec<Attempt>>,
}

impl Transport for MemoryTransport {
    fn submit(&self, endpoint: &str, payload: SignedPayload, completion: Completion) {
        let (attempt, accepted) = {
            let mut attempts = self.attempts.lock();
            let attempt = attempts.len() + 1;
            let accepted = !(self.fail_first && attempt == 1);
            attempts.push(Attempt {
                attempt,
                accepted,
                endpoint: endpoint.to_string(),
                payload,
            });
            (attempt, accepted)
        };

        debug!(attempt, accepted, "Simulated delivery");
        if accepted {
            completion(Ok(()));
        } else {
            completion(Err(TransportError::Failed("simulated outage".to_string())));
        }
    }
}

/// Request primitive answering every call after a fixed latency.
struct SimulatedNetwork {
    clock: Arc<ManualClock>,
    latency_ms: u64,
    next_task: AtomicU64,
}

impl RequestPrimitive for SimulatedNetwork {
    type Handle = u64;

    fn request(&self, options: RequestOptions) -> u64 {
        self.clock.advance(self.latency_ms);
        if let Some(success) = options.success {
            success(json!({"statusCode": 200, "data": {}}));
        }
        if let Some(complete) = options.complete {
            complete(Value::Null);
        }
        self.next_task.fetch_add(1, Ordering::SeqCst)
    }
}

/// Performance service whose entries are pushed by the simulation.
struct SimulatedPerformance {
    clock: Arc<ManualClock>,
    callbacks: Mutex<Vec<PerformanceCallback>>,
}

struct SimulatedObserver;

impl PerformanceObserver for SimulatedObserver {
    fn observe(&self, entry_types: &[&str]) {
        debug!(?entry_types, "Observing performance entries");
    }
}

impl PerformanceService for SimulatedPerformance {
    fn now(&self) -> f64 {
        (self.clock.now_millis() % 1_000_000) as f64
    }

    fn create_observer(&self, callback: PerformanceCallback) -> Box<dyn PerformanceObserver> {
        self.callbacks.lock().push(callback);
        Box::new(SimulatedObserver)
    }
}

impl SimulatedPerformance {
    fn emit(&self, entry: PerformanceEntry) {
        for callback in self.callbacks.lock().iter() {
            callback(vec![entry.clone()]);
        }
    }
}

/// The host's constructor, keeping every definition it receives.
struct SimulatedHost {
    definitions: Mutex<Vec<Arc<Definition<Session>>>>,
}

impl SimulatedHost {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            definitions: Mutex::new(Vec::new()),
        })
    }

    fn definitions(&self) -> Vec<Arc<Definition<Session>>> {
        self.definitions.lock().clone()
    }
}

impl ConstructFactory<Session> for SimulatedHost {
    fn register(&self, definition: Definition<Session>) -> HostResult<()> {
        self.definitions.lock().push(Arc::new(definition));
        Ok(())
    }
}

fn host_call(result: CallResult) -> Result<Value> {
    result.map_err(|e| anyhow::anyhow!(e))
}

fn route(index: u32) -> String {
    format!("pages/room{}/index", index)
}

/// Execute the simulate command.
pub fn execute(
    args: SimulateArgs,
    source: &ConfigSource,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let mut config = source.load()?.with_send_log(true);
    if config.app_id.is_empty() {
        config = config.with_app_id("beacon-simulator");
    }
    let uid_storage_key = config.uid_storage_key.clone();

    let clock = Arc::new(ManualClock::new(SystemClock.now_millis()));
    let storage = Arc::new(MemoryStorage::new());
    let transport = Arc::new(MemoryTransport {
        fail_first: args.fail_first,
        attempts: Mutex::new(Vec::new()),
    });

    let runtime = Beacon::builder()
        .with_config(config)
        .with_storage(Arc::clone(&storage) as Arc<dyn Storage>)
        .with_clock(Arc::clone(&clock) as Arc<dyn Clock>)
        .with_transport(Arc::clone(&transport) as Arc<dyn Transport>)
        .build()
        .context("Failed to create runtime")?;

    let network = Arc::new(runtime.tap_requests(SimulatedNetwork {
        clock: Arc::clone(&clock),
        latency_ms: args.latency,
        next_task: AtomicU64::new(1),
    }));
    let performance = SimulatedPerformance {
        clock: Arc::clone(&clock),
        callbacks: Mutex::new(Vec::new()),
    };

    // Registration
    let app_host = SimulatedHost::new();
    let page_host = SimulatedHost::new();
    let apps = runtime.intercept_app(Arc::clone(&app_host) as Arc<dyn ConstructFactory<Session>>);
    let pages = runtime.intercept_page(Arc::clone(&page_host) as Arc<dyn ConstructFactory<Session>>);

    apps.register(
        Definition::app()
            .with_data("globalData", json!({"brand": "simulator"}))
            .with_hook(LifecycleHook::OnLaunch, |session: &mut Session, _: &[Value]| {
                session.launched = true;
                Ok(Value::Null)
            }),
    )?;

    for index in 0..args.pages {
        let network: Arc<NetworkTap<SimulatedNetwork>> = Arc::clone(&network);
        pages.register(
            Definition::page(route(index))
                .with_data("roomIndex", json!(index))
                .with_hook(LifecycleHook::OnLoad, |session: &mut Session, _: &[Value]| {
                    session.page_views += 1;
                    Ok(Value::Null)
                })
                .with_function("onBook", move |session: &mut Session, _: &[Value]| {
                    session.bookings += 1;
                    let task = network.request(RequestOptions::new(
                        format!("https://api.example.com/rooms/{}/book", index),
                        "POST",
                        json!({"room": index}),
                    ));
                    Ok(json!({"task": task}))
                }),
        )?;
    }

    runtime.collect_performance(&performance);

    // Session
    let mut session = Session::default();
    let app = app_host
        .definitions()
        .into_iter()
        .next()
        .context("App was not registered")?;

    host_call(app.invoke_hook(LifecycleHook::OnLaunch, &mut session, &[json!({"path": route(0)})]))?;
    host_call(app.invoke_hook(LifecycleHook::OnShow, &mut session, &[]))?;
    storage.set(&uid_storage_key, "member-1001".to_string());

    let mut referrer = String::new();
    for page in page_host.definitions() {
        let path = page.identifier().to_string();
        host_call(page.invoke_hook(LifecycleHook::OnLoad, &mut session, &[json!({})]))?;
        host_call(page.invoke_hook(LifecycleHook::OnShow, &mut session, &[]))?;
        performance.emit(PerformanceEntry {
            entry_type: "render".to_string(),
            name: "firstRender".to_string(),
            path: path.clone(),
            referrer_path: referrer.clone(),
            start_time: performance.now(),
            duration: 16.0,
        });

        clock.advance(1_200);
        host_call(page.call("onBook", &mut session, &[json!({"type": "tap"})]))?;
        clock.advance(800);

        host_call(page.invoke_hook(LifecycleHook::OnHide, &mut session, &[]))?;
        host_call(page.invoke_hook(LifecycleHook::OnUnload, &mut session, &[]))?;
        referrer = path;
    }

    host_call(app.invoke_hook(LifecycleHook::OnHide, &mut session, &[]))?;
    let last = runtime.flush();
    debug!(?last, ?session, "Session finished");

    let report = SimulationReport {
        identity: runtime.identity().to_string(),
        registered: runtime
            .registrar()
            .registered()
            .into_iter()
            .map(|construct| match construct.kind {
                ConstructKind::App => construct.kind.to_string(),
                _ => format!("{} {}", construct.kind, construct.identifier),
            })
            .collect(),
        attempts: std::mem::take(&mut *transport.attempts.lock()),
        stats: runtime.stats(),
        pending: runtime.buffered(),
    };

    match format {
        OutputFormat::Human => print_human(&report, quiet),
        OutputFormat::Json | OutputFormat::JsonCompact => print_json(&report, format)?,
    }

    Ok(())
}

fn print_human(report: &SimulationReport, quiet: bool) {
    println!("Simulated session");
    println!("  Identity:   {}", report.identity);
    println!("  Registered: {}", report.registered.join(", "));

    for attempt in &report.attempts {
        let payload = &attempt.payload;
        println!(
            "\nDelivery #{} to {}: {} records [{}]",
            attempt.attempt,
            attempt.endpoint,
            payload.len(),
            if attempt.accepted { "accepted" } else { "FAILED" }
        );
        println!("  Timestamp: {}", payload.timestamp);
        println!("  Signature: {}", payload.sign);
        if quiet {
            continue;
        }
        for record in &payload.data.logs {
            println!(
                "    {:<12} {}",
                record.get(keys::TYPE).unwrap_or("?"),
                record.description().unwrap_or("")
            );
        }
    }

    let stats = &report.stats;
    println!("\nStats:");
    println!("  Records enqueued:  {}", stats.records_enqueued);
    println!("  Records delivered: {}", stats.records_delivered);
    println!("  Records requeued:  {}", stats.records_requeued);
    println!("  Batches sent:      {}", stats.batches_sent);
    println!("  Batches failed:    {}", stats.batches_failed);
    if let Some(reason) = &stats.last_failure {
        println!("  Last failure:      {}", reason);
    }
    println!("  Still buffered:    {}", report.pending);
}
