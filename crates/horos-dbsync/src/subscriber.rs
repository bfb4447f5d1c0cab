use crate::error::DbSyncError;
use crate::wire::{decode_magic, decode_meta, ALPN, MAX_META_LEN};
use arc_swap::ArcSwapOption;
use flate2::read::GzDecoder;
use horos_contracts::now_ms;
use parking_lot::Mutex;
use quinn::{Endpoint, ServerConfig};
use rusqlite::{Connection, OpenFlags};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

pub type OnSwap = Arc<dyn Fn() + Send + Sync>;

/// Accepts pushed snapshots, verifies them, and atomically swaps the local
/// read-only replica handle in.
pub struct Subscriber {
    db_path: PathBuf,
    max_snapshot_size: u64,
    max_age: Option<Duration>,
    handle: ArcSwapOption<Mutex<Connection>>,
    on_swap: Mutex<Vec<OnSwap>>,
    received: AtomicBool,
}

impl Subscriber {
    pub fn new(db_path: PathBuf, max_snapshot_size: u64, max_age: Option<Duration>) -> Self {
        Self {
            db_path,
            max_snapshot_size,
            max_age,
            handle: ArcSwapOption::from(None),
            on_swap: Mutex::new(Vec::new()),
            received: AtomicBool::new(false),
        }
    }

    pub fn on_swap(&self, cb: OnSwap) {
        self.on_swap.lock().push(cb);
    }

    /// `healthy` only once at least one snapshot has landed and the
    /// replica handle answers a trivial query.
    pub fn ping(&self) -> bool {
        if !self.received.load(Ordering::SeqCst) {
            return false;
        }
        match self.handle.load_full() {
            Some(conn) => conn.lock().query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            None => false,
        }
    }

    pub fn current_handle(&self) -> Option<Arc<Mutex<Connection>>> {
        self.handle.load_full()
    }

    /// Bind `addr` and accept pushes until the returned endpoint is
    /// dropped or the task is aborted by its caller.
    pub async fn start(self: Arc<Self>, addr: SocketAddr, cert_der: Vec<u8>, key_der: Vec<u8>) -> Result<(), DbSyncError> {
        let server_config = build_server_config(cert_der, key_der)?;
        let endpoint = Endpoint::server(server_config, addr).map_err(|e| DbSyncError::Transport(e.to_string()))?;

        info!(%addr, "dbsync: subscriber listening");
        while let Some(connecting) = endpoint.accept().await {
            let this = self.clone();
            tokio::spawn(async move {
                match connecting.await {
                    Ok(connection) => {
                        if let Err(e) = this.handle_connection(connection).await {
                            warn!(error = %e, "dbsync: connection failed");
                        }
                    }
                    Err(e) => warn!(error = %e, "dbsync: handshake failed"),
                }
            });
        }
        Ok(())
    }

    async fn handle_connection(&self, connection: quinn::Connection) -> Result<(), DbSyncError> {
        let (_send, mut recv) = connection
            .accept_bi()
            .await
            .map_err(|e| DbSyncError::Transport(e.to_string()))?;

        let mut magic = [0u8; 4];
        recv.read_exact(&mut magic).await.map_err(|e| DbSyncError::Transport(e.to_string()))?;
        decode_magic(&magic)?;

        let mut len_buf = [0u8; 4];
        recv.read_exact(&mut len_buf).await.map_err(|e| DbSyncError::Transport(e.to_string()))?;
        let meta_len = u32::from_be_bytes(len_buf) as usize;
        if meta_len > MAX_META_LEN {
            return Err(DbSyncError::Protocol(format!("metadata too large: {meta_len} bytes")));
        }

        let mut meta_buf = vec![0u8; meta_len];
        recv.read_exact(&mut meta_buf).await.map_err(|e| DbSyncError::Transport(e.to_string()))?;
        let meta = decode_meta(&meta_buf)?;

        if meta.size > self.max_snapshot_size {
            return Err(DbSyncError::Protocol(format!(
                "snapshot too large: {} > {}",
                meta.size, self.max_snapshot_size
            )));
        }
        if let Some(max_age) = self.max_age {
            let age = Duration::from_secs((now_ms() / 1000 - meta.timestamp).max(0) as u64);
            if age > max_age {
                return Err(DbSyncError::Protocol(format!("snapshot too old: {age:?} > {max_age:?}")));
            }
        }

        let incoming_path = std::path::PathBuf::from(format!("{}.incoming", self.db_path.display()));
        let result = self.receive_payload(&mut recv, &meta, &incoming_path).await;
        if let Err(e) = &result {
            let _ = std::fs::remove_file(&incoming_path);
            return Err(DbSyncError::Protocol(e.to_string()));
        }

        self.swap_in(&incoming_path)?;
        self.received.store(true, Ordering::SeqCst);
        for cb in self.on_swap.lock().iter() {
            cb();
        }
        Ok(())
    }

    async fn receive_payload(
        &self,
        recv: &mut quinn::RecvStream,
        meta: &crate::snapshot::SnapshotMeta,
        incoming_path: &std::path::Path,
    ) -> Result<(), DbSyncError> {
        let mut raw = Vec::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            match recv.read(&mut buf).await.map_err(|e| DbSyncError::Transport(e.to_string()))? {
                Some(0) | None => break,
                Some(n) => {
                    raw.extend_from_slice(&buf[..n]);
                    if raw.len() as u64 > self.max_snapshot_size.saturating_mul(2) {
                        return Err(DbSyncError::Protocol("payload exceeded size cap mid-stream".to_string()));
                    }
                }
            }
        }

        let bytes: Vec<u8> = if meta.compressed {
            let mut decoder = GzDecoder::new(&raw[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(DbSyncError::Io)?;
            out
        } else {
            raw
        };

        if bytes.len() as u64 != meta.size {
            return Err(DbSyncError::SizeMismatch { expected: meta.size, actual: bytes.len() as u64 });
        }
        let hash = hex::encode(Sha256::digest(&bytes));
        if hash != meta.hash {
            return Err(DbSyncError::HashMismatch { expected: meta.hash.clone(), actual: hash });
        }

        std::fs::write(incoming_path, &bytes)?;
        Ok(())
    }

    fn swap_in(&self, incoming_path: &std::path::Path) -> Result<(), DbSyncError> {
        // Drop our reference to the old handle; readers holding their own
        // Arc keep working against the old inode until they finish.
        let wal = std::path::PathBuf::from(format!("{}-wal", self.db_path.display()));
        let shm = std::path::PathBuf::from(format!("{}-shm", self.db_path.display()));
        let _ = std::fs::remove_file(&wal);
        let _ = std::fs::remove_file(&shm);

        std::fs::rename(incoming_path, &self.db_path)?;

        let new_conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        self.handle.store(Some(Arc::new(Mutex::new(new_conn))));
        Ok(())
    }
}

fn build_server_config(cert_der: Vec<u8>, key_der: Vec<u8>) -> Result<ServerConfig, DbSyncError> {
    let cert = rustls::Certificate(cert_der);
    let key = rustls::PrivateKey(key_der);
    let mut crypto = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)
        .map_err(|e| DbSyncError::Transport(e.to_string()))?;
    crypto.alpn_protocols = vec![ALPN.to_vec()];
    Ok(ServerConfig::with_crypto(Arc::new(crypto)))
}
