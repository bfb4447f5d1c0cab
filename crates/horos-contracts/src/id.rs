use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new random identifier, used for VTQ job ids, dynamic-tool
/// history keys, and anywhere else an opaque unique id is needed.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time in milliseconds since the epoch — the unit `visible_at`,
/// `created_at`, and `SnapshotMeta.version` are all expressed in.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

/// Current time in whole seconds since the epoch, used for `SnapshotMeta.timestamp`.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as i64
}
