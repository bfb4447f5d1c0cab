use thiserror::Error;

/// Protocol-level failures: the caller asked for something malformed or
/// nonexistent. Never swallowed, always surfaced as-is.
#[derive(Debug, Error, Clone)]
pub enum RegistryError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("readonly tool cannot use handler_type=sql_script: {0}")]
    ReadonlyScriptRejected(String),

    #[error("readonly sql_query must begin with SELECT/WITH/EXPLAIN/PRAGMA: {0}")]
    ReadonlyNonSelect(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("native function not registered: {0}")]
    NativeFunctionMissing(String),
}

/// Tool-level failures — the call reached a handler (or a policy check)
/// but that handler/check failed. Returned as part of a *successful*
/// protocol round-trip, distinct from a protocol-level [`RegistryError`]
/// such as an unknown tool or a missing parameter.
#[derive(Debug, Clone)]
pub enum ToolError {
    PolicyDenied { tool: String, role: String },
    HandlerFailed(String),
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolError::PolicyDenied { tool, role } => {
                write!(f, "role '{role}' denied for tool '{tool}'")
            }
            ToolError::HandlerFailed(msg) => write!(f, "handler failed: {msg}"),
        }
    }
}
