use crate::error::DbSyncError;
use crate::snapshot::SnapshotMeta;

pub const MAGIC: &[u8; 4] = b"SYN1";
pub const ALPN: &[u8] = b"horos-dbsync-v1";
pub const MAX_META_LEN: usize = 1024 * 1024;

/// Frame a metadata header: `MAGIC | BE-u32 len | metaJSON`. The payload
/// itself streams separately (see `publisher`/`subscriber`).
pub fn encode_header(meta: &SnapshotMeta) -> Result<Vec<u8>, DbSyncError> {
    let json = serde_json::to_vec(meta).map_err(|e| DbSyncError::Protocol(e.to_string()))?;
    if json.len() > MAX_META_LEN {
        return Err(DbSyncError::Protocol(format!("metadata too large: {} bytes", json.len())));
    }
    let mut out = Vec::with_capacity(4 + 4 + json.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(json.len() as u32).to_be_bytes());
    out.extend_from_slice(&json);
    Ok(out)
}

pub fn decode_magic(buf: &[u8; 4]) -> Result<(), DbSyncError> {
    if buf != MAGIC {
        return Err(DbSyncError::Protocol(format!("bad magic: {buf:?}")));
    }
    Ok(())
}

pub fn decode_meta(json: &[u8]) -> Result<SnapshotMeta, DbSyncError> {
    serde_json::from_slice(json).map_err(|e| DbSyncError::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let meta = SnapshotMeta { version: 1, hash: "abc".into(), size: 10, timestamp: 100, compressed: false };
        let bytes = encode_header(&meta).unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        let len = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let decoded = decode_meta(&bytes[8..8 + len]).unwrap();
        assert_eq!(decoded.hash, "abc");
        assert_eq!(decoded.size, 10);
    }
}
