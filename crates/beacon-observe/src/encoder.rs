//! Conversion of telemetry events into wire records.

use std::sync::Arc;

use tracing::trace;

use beacon_core::{Clock, Storage, TelemetryEvent};

use crate::record::{EventRecord, Field, keys};

/// Builds [`EventRecord`]s from [`TelemetryEvent`]s.
///
/// The user id is read from storage on every call so a login during the
/// session shows up in subsequent records.
pub struct Encoder {
    storage: Arc<dyn Storage>,
    uid_storage_key: String,
    trace_id: String,
    clock: Arc<dyn Clock>,
}

impl Encoder {
    /// Create an encoder.
    pub fn new(
        storage: Arc<dyn Storage>,
        uid_storage_key: impl Into<String>,
        trace_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            uid_storage_key: uid_storage_key.into(),
            trace_id: trace_id.into(),
            clock,
        }
    }

    /// Client identity stamped into every record.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Encode an event.
    pub fn encode(&self, event: &TelemetryEvent) -> EventRecord {
        let (path, referrer_path, description) = match event {
            TelemetryEvent::Lifecycle {
                owner,
                hook,
                identifier,
            } => (
                identifier.clone(),
                String::new(),
                format!("[{}] - {} - {}", owner.label(), hook, identifier),
            ),
            TelemetryEvent::Interaction {
                event_type,
                owner,
                method,
            } => (
                owner.clone(),
                String::new(),
                format!("[{}] - {} - {}", event_type, owner, method),
            ),
            TelemetryEvent::ApiRequest { path, duration_ms } => (
                path.clone(),
                String::new(),
                format!("TotalTime: {}ms", duration_ms),
            ),
            TelemetryEvent::Performance(entry) => (
                entry.path.clone(),
                entry.referrer_path.clone(),
                format!(
                    "[{}] - {} - StartTime: {} - {}",
                    entry.entry_type,
                    entry.name,
                    format_number(entry.start_time),
                    format_number(entry.duration)
                ),
            ),
            TelemetryEvent::Error { payload } => (String::new(), String::new(), payload.clone()),
        };

        let kind = event.kind();
        let user_id = self.storage.get(&self.uid_storage_key).unwrap_or_default();
        trace!(kind = %kind, path = %path, "Encoded event");

        EventRecord {
            time: self.clock.unix_seconds(),
            contents: vec![
                Field::new(keys::USER_ID, user_id),
                Field::new(keys::TRACE_ID, self.trace_id.as_str()),
                Field::new(keys::TYPE, kind.as_str()),
                Field::new(keys::PATH, path),
                Field::new(keys::REFERRER_PATH, referrer_path),
                Field::new(keys::DESCRIPTION, description),
            ],
        }
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("uid_storage_key", &self.uid_storage_key)
            .field("trace_id", &self.trace_id)
            .finish_non_exhaustive()
    }
}

/// Render a number the way the host's number-to-string does.
///
/// Shortest round-trip digits, plain notation for decimal exponents in
/// `-7..21`, and `1e+21` / `1.5e-7` style exponents outside that range.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest round-trip digits as `d[.ddd]e<exp>`.
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent.parse::<i32>().unwrap_or(0) + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        format!("{}.{}", int, frac)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let sign = if e >= 0 { '+' } else { '-' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, sign, e.abs())
        } else {
            format!("{}.{}e{}{}", first, rest, sign, e.abs())
        }
    };

    if value < 0.0 { format!("-{}", body) } else { body }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{ConstructKind, LifecycleHook, ManualClock, MemoryStorage, PerformanceEntry};

    fn encoder() -> (Arc<MemoryStorage>, Encoder) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::at_seconds(1_700_000_000));
        let encoder = Encoder::new(
            Arc::clone(&storage) as Arc<dyn Storage>,
            "userId",
            "trace-1",
            clock,
        );
        (storage, encoder)
    }

    fn values(record: &EventRecord) -> Vec<(&str, &str)> {
        record
            .contents
            .iter()
            .map(|field| (field.key.as_str(), field.value.as_str()))
            .collect()
    }

    #[test]
    fn test_lifecycle_record() {
        let (_, encoder) = encoder();
        let record = encoder.encode(&TelemetryEvent::Lifecycle {
            owner: ConstructKind::Page,
            hook: LifecycleHook::OnLoad,
            identifier: "pages/index/index".to_string(),
        });

        assert_eq!(record.time, 1_700_000_000);
        assert_eq!(
            values(&record),
            vec![
                ("userId", ""),
                ("traceId", "trace-1"),
                ("type", "lifecycle"),
                ("path", "pages/index/index"),
                ("referrerPath", ""),
                ("description", "[Page] - onLoad - pages/index/index"),
            ]
        );
    }

    #[test]
    fn test_app_lifecycle_has_empty_identifier() {
        let (_, encoder) = encoder();
        let record = encoder.encode(&TelemetryEvent::Lifecycle {
            owner: ConstructKind::App,
            hook: LifecycleHook::OnLaunch,
            identifier: String::new(),
        });
        assert_eq!(record.description(), Some("[App] - onLaunch - "));
    }

    #[test]
    fn test_user_id_read_at_encode_time() {
        let (storage, encoder) = encoder();
        let event = TelemetryEvent::Error {
            payload: "{\"message\":\"boom\"}".to_string(),
        };

        assert_eq!(encoder.encode(&event).get(keys::USER_ID), Some(""));
        storage.set("userId", "u-77".to_string());
        let record = encoder.encode(&event);
        assert_eq!(record.get(keys::USER_ID), Some("u-77"));
        assert_eq!(record.get(keys::PATH), Some(""));
        assert_eq!(record.description(), Some("{\"message\":\"boom\"}"));
    }

    #[test]
    fn test_interaction_and_request_descriptions() {
        let (_, encoder) = encoder();
        let tap = encoder.encode(&TelemetryEvent::Interaction {
            event_type: "tap".to_string(),
            owner: "pages/cart".to_string(),
            method: "checkout".to_string(),
        });
        assert_eq!(tap.get(keys::TYPE), Some("events"));
        assert_eq!(tap.get(keys::PATH), Some("pages/cart"));
        assert_eq!(tap.description(), Some("[tap] - pages/cart - checkout"));

        let request = encoder.encode(&TelemetryEvent::ApiRequest {
            path: "https://api.example.com/rooms".to_string(),
            duration_ms: 87,
        });
        assert_eq!(request.get(keys::TYPE), Some("apiRequest"));
        assert_eq!(request.description(), Some("TotalTime: 87ms"));
    }

    #[test]
    fn test_performance_record() {
        let (_, encoder) = encoder();
        let record = encoder.encode(&TelemetryEvent::Performance(PerformanceEntry {
            entry_type: "render".to_string(),
            name: "firstRender".to_string(),
            path: "pages/index/index".to_string(),
            referrer_path: "pages/home/home".to_string(),
            start_time: 1200.0,
            duration: 12.5,
        }));

        assert_eq!(record.get(keys::REFERRER_PATH), Some("pages/home/home"));
        assert_eq!(
            record.description(),
            Some("[render] - firstRender - StartTime: 1200 - 12.5")
        );

        let launch = encoder.encode(&TelemetryEvent::Performance(PerformanceEntry::launch(0.0)));
        assert_eq!(launch.description(), Some("[App] - launch - StartTime: 0 - 0"));
        assert_eq!(launch.get(keys::PATH), Some("/"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(12.5), "12.5");
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(1200.0), "1200");
        assert_eq!(format_number(-3.25), "-3.25");
        assert_eq!(format_number(0.000001), "0.000001");
    }

    #[test]
    fn test_format_number_exponent_ranges() {
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e21), "1.5e+21");
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(1e-7), "1e-7");
        assert_eq!(format_number(-2.5e-8), "-2.5e-8");
        assert_eq!(format_number(5e-324), "5e-324");
    }
}
