use crate::error::{RegistryError, ToolError};
use crate::placeholders;
use crate::store::RegistryStore;
use crate::tool::{evaluate_policy, is_statically_non_mutating, DynamicTool, HandlerType, Mode, ToolPolicyRule};
use parking_lot::{Mutex, RwLock};
use rusqlite::Connection;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type NativeFn = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// Called before dispatch; `(tool_name, role)` → allowed. Defaults to the
/// `tool_policy` table via [`evaluate_policy`] but a bridge may override it
/// entirely with its own authorization logic.
pub type PolicyHook = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub tool_name: String,
    pub version: i64,
    pub params: Value,
    pub result: Result<Value, String>,
    pub duration: Duration,
}

pub type AuditHook = Arc<dyn Fn(AuditRecord) + Send + Sync>;

#[derive(Default)]
struct Snapshot {
    tools: HashMap<String, DynamicTool>,
    policy: Vec<ToolPolicyRule>,
}

/// Outcome of a tool call as distinct from whether the *request itself*
/// was well-formed (that distinction is `RegistryError` vs `Ok(..)`).
pub type ExecuteOutcome = Result<Value, ToolError>;

pub struct Registry {
    store: Arc<dyn RegistryStore>,
    snapshot: RwLock<Snapshot>,
    native_fns: RwLock<HashMap<String, NativeFn>>,
    policy_hook: RwLock<Option<PolicyHook>>,
    audit_hook: RwLock<Option<AuditHook>>,
    conn: Arc<Mutex<Connection>>,
}

impl Registry {
    pub fn new(store: Arc<dyn RegistryStore>, conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Snapshot::default()),
            native_fns: RwLock::new(HashMap::new()),
            policy_hook: RwLock::new(None),
            audit_hook: RwLock::new(None),
            conn,
        }
    }

    pub fn set_policy_hook(&self, hook: PolicyHook) {
        *self.policy_hook.write() = Some(hook);
    }

    pub fn set_audit_hook(&self, hook: AuditHook) {
        *self.audit_hook.write() = Some(hook);
    }

    pub fn register_native_function(&self, name: impl Into<String>, f: NativeFn) {
        self.native_fns.write().insert(name.into(), f);
    }

    /// Snapshot all active tools plus policy rules and atomically replace
    /// the in-memory view. Rows that fail to parse were already skipped
    /// (and logged) by the store.
    pub fn load_tools(&self) -> Result<(), RegistryError> {
        let tools = self
            .store
            .list_active_tools()
            .map_err(RegistryError::Storage)?;
        let policy = self
            .store
            .list_policy_rules()
            .map_err(RegistryError::Storage)?;

        let mut by_name = HashMap::with_capacity(tools.len());
        for tool in tools {
            by_name.insert(tool.name.clone(), tool);
        }
        *self.snapshot.write() = Snapshot { tools: by_name, policy };
        Ok(())
    }

    pub fn list_tools(&self) -> Vec<DynamicTool> {
        self.snapshot.read().tools.values().cloned().collect()
    }

    /// `role` identifies the caller for policy evaluation; pass `"*"` if
    /// the hosting process does not model roles.
    pub fn execute(&self, name: &str, role: &str, params: Value) -> Result<ExecuteOutcome, RegistryError> {
        let started = Instant::now();
        let tool = {
            let snap = self.snapshot.read();
            snap.tools
                .get(name)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?
        };

        if tool.mode == Mode::Readonly && tool.handler_type == HandlerType::SqlScript {
            return Err(RegistryError::ReadonlyScriptRejected(name.to_string()));
        }

        for required in tool.required_params() {
            if params.get(&required).is_none() {
                return Err(RegistryError::MissingParameter(required));
            }
        }

        let allowed = {
            let hook = self.policy_hook.read();
            match hook.as_ref() {
                Some(hook) => hook(name, role),
                None => {
                    let snap = self.snapshot.read();
                    evaluate_policy(&snap.policy, name, role)
                }
            }
        };

        let outcome: ExecuteOutcome = if !allowed {
            Err(ToolError::PolicyDenied { tool: name.to_string(), role: role.to_string() })
        } else {
            match self.dispatch(&tool, &params) {
                Ok(value) => Ok(value),
                Err(e) => match e {
                    DispatchError::Protocol(pe) => return Err(pe),
                    DispatchError::Handler(msg) => Err(ToolError::HandlerFailed(msg)),
                },
            }
        };

        if let Some(hook) = self.audit_hook.read().as_ref() {
            hook(AuditRecord {
                tool_name: name.to_string(),
                version: tool.version,
                params,
                result: outcome.clone().map_err(|e| e.to_string()),
                duration: started.elapsed(),
            });
        }

        Ok(outcome)
    }

    fn dispatch(&self, tool: &DynamicTool, params: &Value) -> Result<Value, DispatchError> {
        match tool.handler_type {
            HandlerType::SqlQuery => self.dispatch_sql_query(tool, params),
            HandlerType::SqlScript => self.dispatch_sql_script(tool, params),
            HandlerType::NativeFunction => self.dispatch_native(tool, params),
        }
    }

    fn dispatch_sql_query(&self, tool: &DynamicTool, params: &Value) -> Result<Value, DispatchError> {
        let template = tool
            .handler_config
            .get("sql")
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::Handler("handler_config.sql missing".to_string()))?;

        if tool.mode == Mode::Readonly && !is_statically_non_mutating(template) {
            return Err(DispatchError::Protocol(RegistryError::ReadonlyNonSelect(tool.name.clone())));
        }

        let sql = placeholders::substitute(template, params).map_err(DispatchError::Handler)?;

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql).map_err(|e| DispatchError::Handler(e.to_string()))?;
        let column_count = stmt.column_count();
        let column_names: Vec<String> = (0..column_count)
            .map(|i| stmt.column_name(i).unwrap_or("").to_string())
            .collect();

        let mut rows = stmt.query([]).map_err(|e| DispatchError::Handler(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| DispatchError::Handler(e.to_string()))? {
            let mut obj = serde_json::Map::new();
            for (i, col) in column_names.iter().enumerate() {
                let value: Value = match row.get_ref(i).map_err(|e| DispatchError::Handler(e.to_string()))? {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(n) => Value::from(n),
                    rusqlite::types::ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
                    rusqlite::types::ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
                    rusqlite::types::ValueRef::Blob(b) => Value::String(hex::encode(b)),
                };
                obj.insert(col.clone(), value);
            }
            out.push(Value::Object(obj));
        }

        match out.len() {
            1 => Ok(out.into_iter().next().unwrap()),
            _ => Ok(Value::Array(out)),
        }
    }

    fn dispatch_sql_script(&self, tool: &DynamicTool, params: &Value) -> Result<Value, DispatchError> {
        let script = tool
            .handler_config
            .get("script")
            .and_then(Value::as_str)
            .ok_or_else(|| DispatchError::Handler("handler_config.script missing".to_string()))?;
        let transactional = tool.handler_config.get("transactional").and_then(Value::as_bool).unwrap_or(true);
        let return_affected = tool.handler_config.get("return_affected_rows").and_then(Value::as_bool).unwrap_or(false);

        let script = placeholders::substitute(script, params).map_err(DispatchError::Handler)?;

        let mut conn = self.conn.lock();
        if transactional {
            let tx = conn.transaction().map_err(|e| DispatchError::Handler(e.to_string()))?;
            tx.execute_batch(&script).map_err(|e| DispatchError::Handler(e.to_string()))?;
            let affected = tx.changes();
            tx.commit().map_err(|e| DispatchError::Handler(e.to_string()))?;
            if return_affected {
                return Ok(serde_json::json!({ "affected_rows": affected }));
            }
        } else {
            conn.execute_batch(&script).map_err(|e| DispatchError::Handler(e.to_string()))?;
            if return_affected {
                let affected = conn.changes();
                return Ok(serde_json::json!({ "affected_rows": affected }));
            }
        }
        Ok(Value::Null)
    }

    fn dispatch_native(&self, tool: &DynamicTool, params: &Value) -> Result<Value, DispatchError> {
        let f = self
            .native_fns
            .read()
            .get(&tool.name)
            .cloned()
            .ok_or_else(|| DispatchError::Protocol(RegistryError::NativeFunctionMissing(tool.name.clone())))?;
        f(params).map_err(DispatchError::Handler)
    }
}

enum DispatchError {
    Protocol(RegistryError),
    Handler(String),
}
