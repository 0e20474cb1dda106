//! Registration interception for host constructs.
//!
//! Instead of rebinding the host's App/Page/Component constructors, each is
//! modeled as a [`ConstructFactory`]. An [`InterceptingFactory`] holds the
//! host's factory as its explicit `next` step: it instruments the definition
//! and then calls through. Whether a registration is acceptable is for the
//! host to decide; the [`Registrar`] only keeps a record of what it accepted.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use beacon_core::{ConstructKind, LifecycleHook};

use crate::definition::Definition;
use crate::error::{HostError, HostResult};
use crate::instrument::Instrumenter;

/// Host abstraction for "register a definition".
pub trait ConstructFactory<I>: Send + Sync {
    /// Register a definition with the host.
    fn register(&self, definition: Definition<I>) -> HostResult<()>;
}

impl<I, F> ConstructFactory<I> for F
where
    F: Fn(Definition<I>) -> HostResult<()> + Send + Sync,
{
    fn register(&self, definition: Definition<I>) -> HostResult<()> {
        self(definition)
    }
}

/// Information about an intercepted registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredConstruct {
    /// Construct family.
    pub kind: ConstructKind,
    /// Route or component identifier.
    pub identifier: String,
    /// Recognized hooks the user declared.
    pub hooks: Vec<LifecycleHook>,
    /// Interceptable methods.
    pub methods: Vec<String>,
}

/// Record of intercepted constructs, shared by all factories of a client.
///
/// Keyed by family and identifier; a later registration of the same key
/// replaces the earlier entry.
#[derive(Debug, Default)]
pub struct Registrar {
    registered: DashMap<(ConstructKind, String), RegisteredConstruct>,
}

impl Registrar {
    /// Create an empty registrar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a construct is already registered.
    pub fn is_registered(&self, kind: ConstructKind, identifier: &str) -> bool {
        self.registered
            .contains_key(&(kind, identifier.to_string()))
    }

    /// All registrations, ordered by family then identifier.
    pub fn registered(&self) -> Vec<RegisteredConstruct> {
        let mut all: Vec<RegisteredConstruct> =
            self.registered.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by(|a, b| {
            (a.kind as u8, &a.identifier).cmp(&(b.kind as u8, &b.identifier))
        });
        all
    }

    /// Registrations of one family.
    pub fn registered_of(&self, kind: ConstructKind) -> Vec<RegisteredConstruct> {
        self.registered()
            .into_iter()
            .filter(|construct| construct.kind == kind)
            .collect()
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    fn record(&self, construct: RegisteredConstruct) {
        let key = (construct.kind, construct.identifier.clone());
        if self.registered.insert(key, construct).is_some() {
            debug!("Replaced earlier registration record");
        }
    }
}

/// A factory that instruments definitions before handing them to the host.
pub struct InterceptingFactory<I> {
    kind: ConstructKind,
    next: Arc<dyn ConstructFactory<I>>,
    instrumenter: Instrumenter,
    registrar: Arc<Registrar>,
}

impl<I: 'static> InterceptingFactory<I> {
    /// Create an intercepting factory for one construct family.
    pub fn new(
        kind: ConstructKind,
        next: Arc<dyn ConstructFactory<I>>,
        instrumenter: Instrumenter,
        registrar: Arc<Registrar>,
    ) -> Self {
        info!(kind = %kind, "Installed registration interceptor");
        Self {
            kind,
            next,
            instrumenter,
            registrar,
        }
    }

    /// Family this factory registers.
    pub fn kind(&self) -> ConstructKind {
        self.kind
    }

    /// The shared registrar.
    pub fn registrar(&self) -> &Arc<Registrar> {
        &self.registrar
    }
}

impl<I: 'static> ConstructFactory<I> for InterceptingFactory<I> {
    fn register(&self, definition: Definition<I>) -> HostResult<()> {
        if definition.kind() != self.kind {
            return Err(HostError::KindMismatch {
                expected: self.kind,
                actual: definition.kind(),
            });
        }

        let identifier = definition.identifier().to_string();
        let methods = match self.kind {
            ConstructKind::App => Vec::new(),
            ConstructKind::Page => definition
                .function_names()
                .into_iter()
                .filter(|name| {
                    LifecycleHook::from_name(name).is_none_or(|hook| !self.kind.recognizes(hook))
                })
                .map(String::from)
                .collect(),
            ConstructKind::Component => definition
                .method_names()
                .into_iter()
                .map(String::from)
                .collect(),
        };

        let construct = RegisteredConstruct {
            kind: self.kind,
            identifier: identifier.clone(),
            hooks: definition.declared_hooks(),
            methods,
        };

        let instrumented = self.instrumenter.instrument(definition);
        if let Err(e) = self.next.register(instrumented) {
            warn!(kind = %self.kind, identifier = %identifier, error = %e, "Host rejected registration");
            return Err(e);
        }

        self.registrar.record(construct);
        debug!(kind = %self.kind, identifier = %identifier, "Registered construct");
        Ok(())
    }
}

impl<I> std::fmt::Debug for InterceptingFactory<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptingFactory")
            .field("kind", &self.kind)
            .field("registered", &self.registrar.len())
            .finish()
    }
}
