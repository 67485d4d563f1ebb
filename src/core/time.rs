//! Shared timestamp/identifier helpers for journal records and CLI envelopes.

use chrono::Local;
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Local wall-clock time as ISO-8601 with microseconds and no offset
/// (e.g. `2025-10-27T14:03:12.501234`).
pub fn now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Second-resolution stamp used for session ids and signal topics
/// (e.g. `20251027_140312`).
pub fn compact_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_iso(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
