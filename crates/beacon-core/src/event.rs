//! Telemetry events produced by instrumentation.
//!
//! The set of event kinds is closed: every producer emits a
//! [`TelemetryEvent`] variant and every consumer matches on all of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Wire name of each event kind (the `type` field of a record).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogKind {
    /// Lifecycle hook invocation.
    #[serde(rename = "lifecycle")]
    Lifecycle,
    /// User interaction with a method.
    #[serde(rename = "events")]
    Interaction,
    /// Outbound request timing.
    #[serde(rename = "apiRequest")]
    ApiRequest,
    /// Performance entry.
    #[serde(rename = "performance")]
    Performance,
    /// Application error.
    #[serde(rename = "error")]
    Error,
}

impl LogKind {
    /// All kinds, in wire-contract order.
    pub const ALL: [LogKind; 5] = [
        LogKind::Lifecycle,
        LogKind::Interaction,
        LogKind::ApiRequest,
        LogKind::Performance,
        LogKind::Error,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Lifecycle => "lifecycle",
            LogKind::Interaction => "events",
            LogKind::ApiRequest => "apiRequest",
            LogKind::Performance => "performance",
            LogKind::Error => "error",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownLogKind(s.to_string()))
    }
}

/// Family of host construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstructKind {
    /// The application root.
    App,
    /// A page.
    Page,
    /// A reusable component.
    Component,
}

impl ConstructKind {
    /// Owner label used in lifecycle descriptions.
    pub fn label(&self) -> &'static str {
        match self {
            ConstructKind::App => "App",
            ConstructKind::Page => "Page",
            ConstructKind::Component => "Component",
        }
    }

    /// Hooks recognized for this family, in host order.
    pub fn recognized_hooks(&self) -> &'static [LifecycleHook] {
        match self {
            ConstructKind::App => &[
                LifecycleHook::OnLaunch,
                LifecycleHook::OnShow,
                LifecycleHook::OnHide,
                LifecycleHook::OnError,
            ],
            ConstructKind::Page | ConstructKind::Component => &[
                LifecycleHook::OnLoad,
                LifecycleHook::OnShow,
                LifecycleHook::OnHide,
                LifecycleHook::OnUnload,
            ],
        }
    }

    /// Check if a hook is recognized for this family.
    pub fn recognizes(&self, hook: LifecycleHook) -> bool {
        self.recognized_hooks().contains(&hook)
    }

    /// Hook whose observation requests a flush.
    pub fn flush_hook(&self) -> LifecycleHook {
        match self {
            ConstructKind::App => LifecycleHook::OnShow,
            ConstructKind::Page | ConstructKind::Component => LifecycleHook::OnUnload,
        }
    }
}

impl fmt::Display for ConstructKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle hooks known to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifecycleHook {
    /// App launched.
    #[serde(rename = "onLaunch")]
    OnLaunch,
    /// Page or component loaded.
    #[serde(rename = "onLoad")]
    OnLoad,
    /// Shown / foregrounded.
    #[serde(rename = "onShow")]
    OnShow,
    /// Hidden / backgrounded.
    #[serde(rename = "onHide")]
    OnHide,
    /// Page or component unloaded.
    #[serde(rename = "onUnload")]
    OnUnload,
    /// App-level error.
    #[serde(rename = "onError")]
    OnError,
}

impl LifecycleHook {
    /// Host name of the hook.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleHook::OnLaunch => "onLaunch",
            LifecycleHook::OnLoad => "onLoad",
            LifecycleHook::OnShow => "onShow",
            LifecycleHook::OnHide => "onHide",
            LifecycleHook::OnUnload => "onUnload",
            LifecycleHook::OnError => "onError",
        }
    }

    /// Parse a host name, returning `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "onLaunch" => Some(LifecycleHook::OnLaunch),
            "onLoad" => Some(LifecycleHook::OnLoad),
            "onShow" => Some(LifecycleHook::OnShow),
            "onHide" => Some(LifecycleHook::OnHide),
            "onUnload" => Some(LifecycleHook::OnUnload),
            "onError" => Some(LifecycleHook::OnError),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry delivered by the performance service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    /// Entry type, e.g. `render` or `navigation`.
    pub entry_type: String,
    /// Entry name.
    pub name: String,
    /// Page path the entry belongs to.
    #[serde(default)]
    pub path: String,
    /// Path navigated from, if any.
    #[serde(default)]
    pub referrer_path: String,
    /// Start time in milliseconds.
    pub start_time: f64,
    /// Duration in milliseconds.
    pub duration: f64,
}

impl PerformanceEntry {
    /// Synthetic entry recorded when performance collection starts.
    pub fn launch(start_time: f64) -> Self {
        Self {
            entry_type: "App".to_string(),
            name: "launch".to_string(),
            path: "/".to_string(),
            referrer_path: String::new(),
            start_time,
            duration: 0.0,
        }
    }
}

/// An event emitted by instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    /// A lifecycle hook was invoked.
    Lifecycle {
        /// Construct family that owns the hook.
        owner: ConstructKind,
        /// The hook.
        hook: LifecycleHook,
        /// Route or component identifier, empty for the app.
        identifier: String,
    },
    /// A user interaction reached a method.
    Interaction {
        /// Interaction type carried by the host event, e.g. `tap`.
        event_type: String,
        /// Route or component identifier owning the method.
        owner: String,
        /// Method name.
        method: String,
    },
    /// An outbound request completed.
    ApiRequest {
        /// Request URL.
        path: String,
        /// Elapsed milliseconds.
        duration_ms: u64,
    },
    /// A performance entry was observed.
    Performance(PerformanceEntry),
    /// An application error was reported.
    Error {
        /// JSON-serialized error payload.
        payload: String,
    },
}

impl TelemetryEvent {
    /// Wire kind of this event.
    pub fn kind(&self) -> LogKind {
        match self {
            TelemetryEvent::Lifecycle { .. } => LogKind::Lifecycle,
            TelemetryEvent::Interaction { .. } => LogKind::Interaction,
            TelemetryEvent::ApiRequest { .. } => LogKind::ApiRequest,
            TelemetryEvent::Performance(_) => LogKind::Performance,
            TelemetryEvent::Error { .. } => LogKind::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_kind_round_trip_names() {
        for kind in LogKind::ALL {
            assert_eq!(kind.as_str().parse::<LogKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_log_kind() {
        let err = "metrics".parse::<LogKind>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownLogKind(ref name) if name == "metrics"));
    }

    #[test]
    fn test_recognized_hooks() {
        assert!(ConstructKind::App.recognizes(LifecycleHook::OnLaunch));
        assert!(ConstructKind::App.recognizes(LifecycleHook::OnError));
        assert!(!ConstructKind::App.recognizes(LifecycleHook::OnUnload));

        assert!(ConstructKind::Page.recognizes(LifecycleHook::OnLoad));
        assert!(!ConstructKind::Component.recognizes(LifecycleHook::OnLaunch));

        assert_eq!(ConstructKind::App.flush_hook(), LifecycleHook::OnShow);
        assert_eq!(ConstructKind::Page.flush_hook(), LifecycleHook::OnUnload);
    }

    #[test]
    fn test_hook_names() {
        assert_eq!(LifecycleHook::from_name("onHide"), Some(LifecycleHook::OnHide));
        assert_eq!(LifecycleHook::from_name("onPullDownRefresh"), None);
        assert_eq!(LifecycleHook::OnUnload.to_string(), "onUnload");
    }

    #[test]
    fn test_performance_entry_from_json() {
        let entry: PerformanceEntry = serde_json::from_str(
            r#"{"entryType":"render","name":"firstRender","startTime":12.5,"duration":3}"#,
        )
        .unwrap();
        assert_eq!(entry.entry_type, "render");
        assert_eq!(entry.path, "");
        assert_eq!(entry.duration, 3.0);
    }

    #[test]
    fn test_event_kind() {
        let event = TelemetryEvent::ApiRequest {
            path: "https://example.com".to_string(),
            duration_ms: 5,
        };
        assert_eq!(event.kind(), LogKind::ApiRequest);
        assert_eq!(
            TelemetryEvent::Performance(PerformanceEntry::launch(0.0)).kind(),
            LogKind::Performance
        );
    }
}
