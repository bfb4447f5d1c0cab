//! `TransportFactory` implementations for the router's remote strategies.
//! `local` and `noop` never reach a factory; `quic`/`mcp`/`dbsync` are left
//! to the hosting process since their wire shapes live outside this crate.

pub mod http;

pub use http::HttpTransportFactory;
