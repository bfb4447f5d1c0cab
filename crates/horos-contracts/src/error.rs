use thiserror::Error;

/// Error taxonomy surfaced at the Router boundary.
///
/// Variants are named for the failure mode, not the underlying cause, so
/// callers can match on `kind` without caring whether a route was missing
/// or a factory panicked.
#[derive(Debug, Error, Clone)]
pub enum RouterError {
    #[error("no route or local handler registered for service '{0}'")]
    ServiceNotFound(String),

    #[error("no transport factory registered for strategy '{strategy}' (service '{service}')")]
    NoFactory { service: String, strategy: String },

    #[error(
        "transport factory failed for service '{service}' (strategy '{strategy}', endpoint {endpoint:?}): {cause}"
    )]
    FactoryFailed {
        service: String,
        strategy: String,
        endpoint: Option<String>,
        cause: String,
    },

    #[error("call to '{0}' exceeded its deadline")]
    CallTimeout(String),

    #[error("circuit open for '{0}'")]
    CircuitOpen(String),

    #[error("handler for '{0}' panicked: {1}")]
    Panic(String, String),

    #[error("call to '{0}' cancelled")]
    Cancelled(String),

    #[error("remote transport error: {0}")]
    Transport(String),
}

impl RouterError {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, RouterError::CircuitOpen(_))
    }
}
