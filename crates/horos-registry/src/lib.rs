//! Dynamic Tool Registry: tool definitions loaded from SQL, reloaded on
//! change, dispatched under readonly and policy constraints.

pub mod error;
mod placeholders;
pub mod registry;
pub mod store;
pub mod tool;

#[cfg(test)]
mod tests;

pub use error::{RegistryError, ToolError};
pub use registry::{AuditHook, AuditRecord, ExecuteOutcome, NativeFn, PolicyHook, Registry};
pub use store::{RegistryStore, SqliteRegistryStore};
pub use tool::{DynamicTool, Effect, HandlerType, Mode, ToolPolicyRule};
