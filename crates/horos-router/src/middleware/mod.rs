//! Built-in middlewares. All preserve the handler signature;
//! `horos_contracts::chain` composes them first-middleware-outermost.

mod breaker;
mod fallback;
mod logging;
mod recovery;
mod retry;
mod timeout;

pub use breaker::circuit_breaker_middleware;
pub use fallback::fallback_middleware;
pub use logging::logging_middleware;
pub use recovery::recovery_middleware;
pub use retry::retry_middleware;
pub use timeout::timeout_middleware;
