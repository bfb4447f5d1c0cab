use horos_contracts::{Route, RouterError, Strategy};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

/// Read-side view of the `routes` table. `Router::reload` only ever needs
/// a full snapshot, so this is the entire contract — a test fake can
/// implement it without touching SQLite at all.
pub trait RouteStore: Send + Sync {
    fn list_routes(&self) -> Result<Vec<Route>, RouterError>;
}

pub struct SqliteRouteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRouteStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Idempotent schema creation — safe to call on every startup.
    pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS routes (
                service_name TEXT PRIMARY KEY,
                strategy TEXT NOT NULL CHECK (strategy IN ('local','http','mcp','quic','dbsync','noop')),
                endpoint TEXT,
                config TEXT NOT NULL DEFAULT '{}',
                updated_at INTEGER NOT NULL
            );
            CREATE TRIGGER IF NOT EXISTS routes_touch_updated_at
            AFTER UPDATE ON routes
            WHEN NEW.updated_at = OLD.updated_at
            BEGIN
                UPDATE routes SET updated_at = CAST(strftime('%s','now') AS INTEGER) * 1000
                WHERE service_name = NEW.service_name;
            END;",
        )
    }
}

impl RouteStore for SqliteRouteStore {
    fn list_routes(&self) -> Result<Vec<Route>, RouterError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT service_name, strategy, endpoint, config, updated_at FROM routes")
            .map_err(|e| RouterError::Transport(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                let strategy_str: String = row.get(1)?;
                let config_str: String = row.get(3)?;
                Ok((
                    row.get::<_, String>(0)?,
                    strategy_str,
                    row.get::<_, Option<String>>(2)?,
                    config_str,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(|e| RouterError::Transport(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows {
            let (service_name, strategy_str, endpoint, config_str, updated_at) =
                row.map_err(|e| RouterError::Transport(e.to_string()))?;
            let Some(strategy) = Strategy::parse(&strategy_str) else {
                tracing::warn!(service = %service_name, strategy = %strategy_str, "skipping route with unknown strategy");
                continue;
            };
            let config = serde_json::from_str(&config_str).unwrap_or(serde_json::json!({}));
            out.push(Route {
                service_name,
                strategy,
                endpoint,
                config,
                updated_at,
            });
        }
        Ok(out)
    }
}
