//! Shared contracts for the horos routing mesh.
//!
//! Everything downstream crate depends on this one: the handler/transport
//! types the Router dispatches through, the error taxonomy surfaced at its
//! boundary, ID generation helpers, and the `Route`/`Strategy` types that
//! describe a row of the `routes` table.

pub mod error;
pub mod handler;
pub mod id;
pub mod route;

pub use error::RouterError;
pub use handler::{boxed, chain, BoxHandler, BuiltTransport, CallContext, CloseFn, Middleware, TransportFactory};
pub use id::{new_id, now_ms, now_secs};
pub use route::{Fingerprint, Route, Strategy};
