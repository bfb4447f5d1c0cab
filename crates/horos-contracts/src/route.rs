use serde::{Deserialize, Serialize};

/// One row of the `routes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub service_name: String,
    pub strategy: Strategy,
    pub endpoint: Option<String>,
    pub config: serde_json::Value,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Local,
    Http,
    Mcp,
    Quic,
    Dbsync,
    Noop,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Local => "local",
            Strategy::Http => "http",
            Strategy::Mcp => "mcp",
            Strategy::Quic => "quic",
            Strategy::Dbsync => "dbsync",
            Strategy::Noop => "noop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Strategy::Local),
            "http" => Some(Strategy::Http),
            "mcp" => Some(Strategy::Mcp),
            "quic" => Some(Strategy::Quic),
            "dbsync" => Some(Strategy::Dbsync),
            "noop" => Some(Strategy::Noop),
            _ => None,
        }
    }

    /// Strategies whose handler is built by a `TransportFactory`.
    /// `local` and `noop` never reach the factory.
    pub fn needs_factory(&self) -> bool {
        !matches!(self, Strategy::Local | Strategy::Noop)
    }
}

/// The tuple `(strategy, endpoint, config)`; equal fingerprints imply
/// handler reuse across a reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Route {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(format!(
            "{}\u{0}{}\u{0}{}",
            self.strategy.as_str(),
            self.endpoint.as_deref().unwrap_or(""),
            self.config
        ))
    }
}
