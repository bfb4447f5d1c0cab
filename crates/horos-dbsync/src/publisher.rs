use crate::error::DbSyncError;
use crate::filter::FilterSpec;
use crate::snapshot::{produce_snapshot, SnapshotMeta};
use crate::wire::{encode_header, ALPN};
use parking_lot::Mutex;
use quinn::{ClientConfig, Endpoint};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub strategy: String,
    pub endpoint: SocketAddr,
}

/// Where the publisher gets its target list — static for tests/simple
/// deployments, routes-backed (`service_name LIKE 'dbsync:%'`) in
/// `horos-cli`.
pub trait TargetProvider: Send + Sync {
    fn targets(&self) -> Vec<Target>;
}

pub struct StaticTargets(pub Vec<Target>);

impl TargetProvider for StaticTargets {
    fn targets(&self) -> Vec<Target> {
        self.0.clone()
    }
}

/// Watches a source store and pushes filtered snapshots to every
/// non-`noop` target, deduped against the last published hash.
pub struct Publisher {
    source_path: PathBuf,
    hot_copy_path: PathBuf,
    filter: FilterSpec,
    targets: Arc<dyn TargetProvider>,
    last_hash: Mutex<Option<String>>,
    endpoint: Endpoint,
}

impl Publisher {
    pub fn new(
        source_path: PathBuf,
        hot_copy_path: PathBuf,
        filter: FilterSpec,
        targets: Arc<dyn TargetProvider>,
    ) -> Result<Self, DbSyncError> {
        Ok(Self {
            source_path,
            hot_copy_path,
            filter,
            targets,
            last_hash: Mutex::new(None),
            endpoint: build_client_endpoint()?,
        })
    }

    /// Called by a Watch reload callback: produce the next snapshot and, if
    /// its hash differs from the last publish, push it to every target
    /// concurrently. A single failing target never blocks the rest.
    pub async fn publish(&self) -> Result<(), DbSyncError> {
        let meta = produce_snapshot(&self.source_path, &self.hot_copy_path, &self.filter)?;

        {
            let mut last = self.last_hash.lock();
            if last.as_deref() == Some(meta.hash.as_str()) {
                return Ok(());
            }
            *last = Some(meta.hash.clone());
        }

        let payload = std::fs::read(&self.hot_copy_path)?;
        let targets: Vec<Target> = self
            .targets
            .targets()
            .into_iter()
            .filter(|t| t.strategy != "noop")
            .collect();

        let pushes = targets.into_iter().map(|target| {
            let endpoint = self.endpoint.clone();
            let meta = meta.clone();
            let payload = payload.clone();
            async move {
                let name = target.name.clone();
                if let Err(e) = push_to(&endpoint, &target, &meta, &payload).await {
                    warn!(target = %name, error = %e, "dbsync: push failed");
                } else {
                    info!(target = %name, version = meta.version, "dbsync: push complete");
                }
            }
        });

        futures::future::join_all(pushes).await;
        Ok(())
    }
}

async fn push_to(
    endpoint: &Endpoint,
    target: &Target,
    meta: &SnapshotMeta,
    payload: &[u8],
) -> Result<(), DbSyncError> {
    let connection = endpoint
        .connect(target.endpoint, "horos-dbsync")
        .map_err(|e| DbSyncError::Transport(e.to_string()))?
        .await
        .map_err(|e| DbSyncError::Transport(e.to_string()))?;

    let (mut send, _recv) = connection
        .open_bi()
        .await
        .map_err(|e| DbSyncError::Transport(e.to_string()))?;

    let header = encode_header(meta)?;
    send.write_all(&header).await.map_err(|e| DbSyncError::Transport(e.to_string()))?;
    send.write_all(payload).await.map_err(|e| DbSyncError::Transport(e.to_string()))?;
    send.finish().await.map_err(|e| DbSyncError::Transport(e.to_string()))?;

    connection.close(0u32.into(), b"done");
    Ok(())
}

fn build_client_endpoint() -> Result<Endpoint, DbSyncError> {
    let mut crypto = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
        .with_no_client_auth();
    crypto.alpn_protocols = vec![ALPN.to_vec()];

    let mut endpoint = Endpoint::client("0.0.0.0:0".parse().unwrap())
        .map_err(|e| DbSyncError::Transport(e.to_string()))?;
    endpoint.set_default_client_config(ClientConfig::new(Arc::new(crypto)));
    Ok(endpoint)
}

/// Skips server certificate validation, for a mesh reachable only on a
/// private network. A mutual-TLS variant that presents a CA is the
/// hardened alternative.
struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
