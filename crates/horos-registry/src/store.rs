use crate::tool::{DynamicTool, Effect, HandlerType, Mode, ToolPolicyRule};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

/// Idempotent schema creation for the dynamic-tools system: the tools
/// table itself, a history table appended to by triggers on every write,
/// and the policy table.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS dynamic_tools (
            tool_name TEXT PRIMARY KEY,
            tool_category TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            input_schema TEXT NOT NULL DEFAULT '{}',
            handler_type TEXT NOT NULL CHECK (handler_type IN ('sql_query','sql_script','native_function')),
            handler_config TEXT NOT NULL DEFAULT '{}',
            mode TEXT NOT NULL CHECK (mode IN ('readonly','readwrite')),
            is_active INTEGER NOT NULL DEFAULT 1,
            version INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            created_by TEXT
        );

        CREATE TABLE IF NOT EXISTS dynamic_tools_history (
            tool_name TEXT NOT NULL,
            version INTEGER NOT NULL,
            tool_category TEXT NOT NULL,
            description TEXT NOT NULL,
            input_schema TEXT NOT NULL,
            handler_type TEXT NOT NULL,
            handler_config TEXT NOT NULL,
            mode TEXT NOT NULL,
            is_active INTEGER NOT NULL,
            change_reason TEXT NOT NULL,
            changed_at INTEGER NOT NULL,
            PRIMARY KEY (tool_name, version)
        );

        CREATE TABLE IF NOT EXISTS tool_policy (
            tool_name TEXT NOT NULL,
            role TEXT NOT NULL,
            effect TEXT NOT NULL CHECK (effect IN ('allow','deny')),
            PRIMARY KEY (tool_name, role)
        );

        CREATE TRIGGER IF NOT EXISTS dynamic_tools_history_insert
        AFTER INSERT ON dynamic_tools
        BEGIN
            INSERT INTO dynamic_tools_history
                (tool_name, version, tool_category, description, input_schema,
                 handler_type, handler_config, mode, is_active, change_reason, changed_at)
            VALUES
                (NEW.tool_name, NEW.version, NEW.tool_category, NEW.description, NEW.input_schema,
                 NEW.handler_type, NEW.handler_config, NEW.mode, NEW.is_active, 'created', NEW.updated_at);
        END;

        CREATE TRIGGER IF NOT EXISTS dynamic_tools_touch_version
        AFTER UPDATE ON dynamic_tools
        WHEN NEW.version = OLD.version
        BEGIN
            UPDATE dynamic_tools
            SET version = OLD.version + 1,
                updated_at = CAST(strftime('%s','now') AS INTEGER) * 1000
            WHERE tool_name = NEW.tool_name;

            INSERT INTO dynamic_tools_history
                (tool_name, version, tool_category, description, input_schema,
                 handler_type, handler_config, mode, is_active, change_reason, changed_at)
            VALUES
                (NEW.tool_name, OLD.version + 1, NEW.tool_category, NEW.description, NEW.input_schema,
                 NEW.handler_type, NEW.handler_config, NEW.mode, NEW.is_active, 'updated',
                 CAST(strftime('%s','now') AS INTEGER) * 1000);
        END;",
    )
}

/// Read-side access to the tools and policy tables. Kept as a trait so
/// `Registry::reload` can be exercised against an in-memory fake without
/// SQLite.
pub trait RegistryStore: Send + Sync {
    fn list_active_tools(&self) -> Result<Vec<DynamicTool>, String>;
    fn list_policy_rules(&self) -> Result<Vec<ToolPolicyRule>, String>;
}

pub struct SqliteRegistryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistryStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }
}

impl RegistryStore for SqliteRegistryStore {
    fn list_active_tools(&self) -> Result<Vec<DynamicTool>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT tool_name, tool_category, description, input_schema, handler_type,
                        handler_config, mode, is_active, version, created_at, updated_at
                 FROM dynamic_tools WHERE is_active = 1",
            )
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, i64>(10)?,
                ))
            })
            .map_err(|e| e.to_string())?;

        let mut out = Vec::new();
        for row in rows {
            let (name, category, description, input_schema, handler_type, handler_config, mode, is_active, version, created_at, updated_at) =
                row.map_err(|e| e.to_string())?;

            let Some(handler_type) = HandlerType::parse(&handler_type) else {
                tracing::warn!(tool = %name, handler_type = %handler_type, "skipping tool with unknown handler_type");
                continue;
            };
            let Some(mode) = Mode::parse(&mode) else {
                tracing::warn!(tool = %name, mode = %mode, "skipping tool with unknown mode");
                continue;
            };
            let Ok(input_schema) = serde_json::from_str(&input_schema) else {
                tracing::warn!(tool = %name, "skipping tool with unparseable input_schema");
                continue;
            };
            let Ok(handler_config) = serde_json::from_str(&handler_config) else {
                tracing::warn!(tool = %name, "skipping tool with unparseable handler_config");
                continue;
            };

            out.push(DynamicTool {
                name,
                category,
                description,
                input_schema,
                handler_type,
                handler_config,
                mode,
                is_active: is_active != 0,
                version,
                created_at,
                updated_at,
            });
        }
        Ok(out)
    }

    fn list_policy_rules(&self) -> Result<Vec<ToolPolicyRule>, String> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT tool_name, role, effect FROM tool_policy")
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(|e| e.to_string())?;

        let mut out = Vec::new();
        for row in rows {
            let (tool_name, role, effect) = row.map_err(|e| e.to_string())?;
            let Some(effect) = Effect::parse(&effect) else {
                tracing::warn!(tool = %tool_name, effect = %effect, "skipping policy rule with unknown effect");
                continue;
            };
            out.push(ToolPolicyRule { tool_name, role, effect });
        }
        Ok(out)
    }
}
