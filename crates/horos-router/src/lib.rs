//! Connectivity Router: per-service dispatch (local / HTTP / MCP-over-QUIC /
//! noop), middleware chain, circuit breaker, retry, fallback, hot reload
//! from a routes table.

pub mod circuit_breaker;
pub mod middleware;
pub mod router;
pub mod store;
pub mod transports;

#[cfg(test)]
mod tests;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use router::{RemoteEntry, Router};
pub use store::{RouteStore, SqliteRouteStore};
pub use transports::HttpTransportFactory;
