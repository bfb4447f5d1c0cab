use crate::error::WatchError;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

/// Returns a monotonic version number; a change since the last poll fires
/// the debounce timer. Recognized implementations: `DataVersionDetector`
/// (primary), `CounterDetector` (user-settable integer), `MaxColumnDetector`.
pub trait Detector: Send + Sync {
    fn detect(&self) -> Result<i64, WatchError>;
}

/// The primary detector: SQLite's `PRAGMA data_version`, which changes on
/// any committed write to the database file, including from other
/// connections/processes — a table-level version counter with no schema
/// changes required.
pub struct DataVersionDetector {
    conn: Arc<Mutex<Connection>>,
}

impl DataVersionDetector {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

impl Detector for DataVersionDetector {
    fn detect(&self) -> Result<i64, WatchError> {
        let conn = self.conn.lock();
        conn.pragma_query_value(None, "data_version", |row| row.get(0))
            .map_err(|e| WatchError::Detector(e.to_string()))
    }
}

/// A user-settable integer, bumped by whatever code owns it (e.g. a test,
/// or a subsystem that wants to force a reload out-of-band).
#[derive(Clone, Default)]
pub struct CounterDetector {
    value: Arc<std::sync::atomic::AtomicI64>,
}

impl CounterDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) -> i64 {
        self.value.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1
    }

    pub fn set(&self, v: i64) {
        self.value.store(v, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Detector for CounterDetector {
    fn detect(&self) -> Result<i64, WatchError> {
        Ok(self.value.load(std::sync::atomic::Ordering::SeqCst))
    }
}

/// `MAX(column)` over a named table — useful when callers want reload
/// driven by a specific column (e.g. `updated_at`) rather than the whole
/// database's write counter.
pub struct MaxColumnDetector {
    conn: Arc<Mutex<Connection>>,
    table: String,
    column: String,
}

impl MaxColumnDetector {
    pub fn new(conn: Arc<Mutex<Connection>>, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
            column: column.into(),
        }
    }
}

impl Detector for MaxColumnDetector {
    fn detect(&self) -> Result<i64, WatchError> {
        let conn = self.conn.lock();
        let sql = format!("SELECT COALESCE(MAX({}), 0) FROM {}", self.column, self.table);
        conn.query_row(&sql, [], |row| row.get(0))
            .map_err(|e| WatchError::Detector(e.to_string()))
    }
}
