//! Wrapping of lifecycle hooks and methods.
//!
//! Instrumentation replaces each recognized hook and each in-scope method
//! with a shim that reports to a [`TelemetrySink`] and then calls the
//! original handler with the same receiver and arguments. The original
//! result, including its error, is returned unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use beacon_core::{ConstructKind, LifecycleHook, TelemetryEvent, TelemetrySink};

use crate::definition::{Definition, Handler, MethodScope};

/// Host interaction type that produces an interaction event.
pub const TAP_EVENT_TYPE: &str = "tap";

/// Applies telemetry shims to definitions.
#[derive(Clone)]
pub struct Instrumenter {
    sink: Arc<dyn TelemetrySink>,
}

impl Instrumenter {
    /// Create an instrumenter reporting to `sink`.
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }

    /// Instrument a definition. Already instrumented definitions are returned as-is.
    pub fn instrument<I: 'static>(&self, mut definition: Definition<I>) -> Definition<I> {
        if definition.instrumented {
            return definition;
        }

        let kind = definition.kind();
        let identifier = definition.identifier().to_string();

        for &hook in kind.recognized_hooks() {
            let original = definition.functions.remove(hook.as_str());
            let declared = original.is_some();
            let shim = self.hook_shim(kind, hook, identifier.clone(), original);
            if declared {
                definition.functions.insert(hook.as_str().to_string(), shim);
            } else {
                definition.shims.insert(hook, shim);
            }
        }

        let wrapped = match MethodScope::for_kind(kind) {
            MethodScope::TopLevel => {
                let names: Vec<String> = definition
                    .functions
                    .keys()
                    .filter(|name| {
                        LifecycleHook::from_name(name).is_none_or(|hook| !kind.recognizes(hook))
                    })
                    .cloned()
                    .collect();
                self.wrap_methods(&mut definition.functions, names, &identifier)
            }
            MethodScope::Nested => {
                let names: Vec<String> = definition.methods.keys().cloned().collect();
                self.wrap_methods(&mut definition.methods, names, &identifier)
            }
            MethodScope::None => 0,
        };

        definition.instrumented = true;
        debug!(
            kind = %kind,
            identifier = %identifier,
            methods = wrapped,
            "Instrumented definition"
        );
        definition
    }

    fn wrap_methods<I: 'static>(
        &self,
        table: &mut BTreeMap<String, Handler<I>>,
        names: Vec<String>,
        owner: &str,
    ) -> usize {
        let count = names.len();
        for name in names {
            if let Some(original) = table.remove(&name) {
                let shim = self.method_shim(owner.to_string(), name.clone(), original);
                table.insert(name, shim);
            }
        }
        count
    }

    fn hook_shim<I: 'static>(
        &self,
        kind: ConstructKind,
        hook: LifecycleHook,
        identifier: String,
        original: Option<Handler<I>>,
    ) -> Handler<I> {
        let sink = Arc::clone(&self.sink);
        Arc::new(move |instance: &mut I, args: &[Value]| {
            sink.track(TelemetryEvent::Lifecycle {
                owner: kind,
                hook,
                identifier: identifier.clone(),
            });
            if hook == kind.flush_hook() {
                sink.request_flush();
            }
            if kind == ConstructKind::App && hook == LifecycleHook::OnError {
                sink.track(TelemetryEvent::Error {
                    payload: error_payload(args),
                });
            }
            match &original {
                Some(handler) => handler(instance, args),
                None => Ok(Value::Null),
            }
        })
    }

    fn method_shim<I: 'static>(
        &self,
        owner: String,
        method: String,
        original: Handler<I>,
    ) -> Handler<I> {
        let sink = Arc::clone(&self.sink);
        Arc::new(move |instance: &mut I, args: &[Value]| {
            if let Some(event_type) = tap_event_type(args) {
                sink.track(TelemetryEvent::Interaction {
                    event_type: event_type.to_string(),
                    owner: owner.clone(),
                    method: method.clone(),
                });
            }
            original(instance, args)
        })
    }
}

impl std::fmt::Debug for Instrumenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumenter").finish_non_exhaustive()
    }
}

/// Event type of the first argument, if it is a tap event.
fn tap_event_type(args: &[Value]) -> Option<&str> {
    args.first()
        .and_then(|event| event.get("type"))
        .and_then(Value::as_str)
        .filter(|event_type| *event_type == TAP_EVENT_TYPE)
}

/// Serialized form of the error handed to `onError`.
fn error_payload(args: &[Value]) -> String {
    args.first().map(Value::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::CollectingSink;
    use serde_json::json;

    #[derive(Default)]
    struct Instance {
        calls: Vec<(String, Vec<Value>)>,
    }

    fn recorder(
        name: &'static str,
    ) -> impl Fn(&mut Instance, &[Value]) -> crate::CallResult + Send + Sync + 'static {
        move |instance: &mut Instance, args: &[Value]| {
            instance.calls.push((name.to_string(), args.to_vec()));
            Ok(json!(name))
        }
    }

    fn setup() -> (Arc<CollectingSink>, Instrumenter) {
        let sink = Arc::new(CollectingSink::new(100));
        let instrumenter = Instrumenter::new(Arc::clone(&sink) as Arc<dyn TelemetrySink>);
        (sink, instrumenter)
    }

    #[test]
    fn test_hook_runs_original_once_with_same_args() {
        let (sink, instrumenter) = setup();
        let def = instrumenter.instrument(
            Definition::page("pages/index/index").with_hook(LifecycleHook::OnLoad, recorder("onLoad")),
        );

        let mut instance = Instance::default();
        let args = vec![json!({"id": "42"})];
        let result = def.invoke_hook(LifecycleHook::OnLoad, &mut instance, &args).unwrap();

        assert_eq!(result, json!("onLoad"));
        assert_eq!(instance.calls, vec![("onLoad".to_string(), args)]);
        assert_eq!(
            sink.events(),
            vec![TelemetryEvent::Lifecycle {
                owner: ConstructKind::Page,
                hook: LifecycleHook::OnLoad,
                identifier: "pages/index/index".to_string(),
            }]
        );
    }

    #[test]
    fn test_undeclared_hooks_are_tracked_without_changing_properties() {
        let (sink, instrumenter) = setup();
        let plain = Definition::<Instance>::page("pages/empty");
        let before = plain.property_names();
        let def = instrumenter.instrument(plain);

        assert_eq!(def.property_names(), before);
        assert!(def.is_instrumented());

        let mut instance = Instance::default();
        for &hook in ConstructKind::Page.recognized_hooks() {
            assert_eq!(def.invoke_hook(hook, &mut instance, &[]).unwrap(), Value::Null);
        }
        assert_eq!(sink.len(), 4);
        assert_eq!(sink.flush_requests(), 1);
    }

    #[test]
    fn test_unload_requests_flush_after_tracking() {
        let (sink, instrumenter) = setup();
        let def = instrumenter.instrument(Definition::<Instance>::component("comp/card"));
        let mut instance = Instance::default();

        def.invoke_hook(LifecycleHook::OnHide, &mut instance, &[]).unwrap();
        assert_eq!(sink.flush_requests(), 0);
        def.invoke_hook(LifecycleHook::OnUnload, &mut instance, &[]).unwrap();
        assert_eq!(sink.flush_requests(), 1);
    }

    #[test]
    fn test_app_show_flushes_and_error_is_routed() {
        let (sink, instrumenter) = setup();
        let def = instrumenter.instrument(
            Definition::app().with_hook(LifecycleHook::OnError, recorder("onError")),
        );
        let mut instance = Instance::default();

        def.invoke_hook(LifecycleHook::OnShow, &mut instance, &[]).unwrap();
        assert_eq!(sink.flush_requests(), 1);

        def.invoke_hook(LifecycleHook::OnError, &mut instance, &[json!("boom")])
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            TelemetryEvent::Error {
                payload: "\"boom\"".to_string()
            }
        );
        assert_eq!(instance.calls.len(), 1);
    }

    #[test]
    fn test_hook_error_propagates_after_tracking() {
        let (sink, instrumenter) = setup();
        let def = instrumenter.instrument(Definition::<Instance>::page("pages/a").with_hook(
            LifecycleHook::OnShow,
            |_, _| Err("render failed".into()),
        ));

        let mut instance = Instance::default();
        let err = def
            .invoke_hook(LifecycleHook::OnShow, &mut instance, &[])
            .unwrap_err();

        assert_eq!(err.to_string(), "render failed");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_page_tap_method_emits_interaction() {
        let (sink, instrumenter) = setup();
        let def = instrumenter.instrument(
            Definition::page("pages/cart").with_function("checkout", recorder("checkout")),
        );
        let mut instance = Instance::default();

        def.call("checkout", &mut instance, &[json!({"type": "tap"})])
            .unwrap();
        assert_eq!(
            sink.events(),
            vec![TelemetryEvent::Interaction {
                event_type: "tap".to_string(),
                owner: "pages/cart".to_string(),
                method: "checkout".to_string(),
            }]
        );

        def.call("checkout", &mut instance, &[json!({"type": "longpress"})])
            .unwrap();
        def.call("checkout", &mut instance, &[]).unwrap();
        def.call("checkout", &mut instance, &[json!("tap")]).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(instance.calls.len(), 4);
    }

    #[test]
    fn test_component_methods_are_nested() {
        let (sink, instrumenter) = setup();
        let def = instrumenter.instrument(
            Definition::component("comp/button")
                .with_function("helper", recorder("helper"))
                .with_method("press", recorder("press")),
        );
        let mut instance = Instance::default();
        let tap = [json!({"type": "tap"})];

        def.call("helper", &mut instance, &tap).unwrap();
        assert!(sink.is_empty());

        def.call_method("press", &mut instance, &tap).unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_app_methods_are_not_wrapped() {
        let (sink, instrumenter) = setup();
        let def = instrumenter.instrument(
            Definition::app().with_function("globalHelper", recorder("globalHelper")),
        );
        let mut instance = Instance::default();

        def.call("globalHelper", &mut instance, &[json!({"type": "tap"})])
            .unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_instrumenting_twice_is_a_no_op() {
        let (sink, instrumenter) = setup();
        let def = instrumenter.instrument(
            Definition::page("pages/a").with_hook(LifecycleHook::OnShow, recorder("onShow")),
        );
        let def = instrumenter.instrument(def);

        let mut instance = Instance::default();
        def.invoke_hook(LifecycleHook::OnShow, &mut instance, &[]).unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(instance.calls.len(), 1);
    }
}
