use crate::error::DbSyncError;
use crate::filter::FilterSpec;
use horos_contracts::now_ms;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: i64,
    pub hash: String,
    pub size: u64,
    pub timestamp: i64,
    pub compressed: bool,
}

/// List every user table (excluding sqlite-internal and the filter's own
/// bookkeeping) currently present in `conn`.
fn list_user_tables(conn: &Connection) -> Result<Vec<String>, DbSyncError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn column_info(conn: &Connection, table: &str) -> Result<Vec<(String, String, bool)>, DbSyncError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |r| {
        let name: String = r.get(1)?;
        let col_type: String = r.get(2)?;
        let not_null: i64 = r.get(3)?;
        Ok((name, col_type, not_null != 0))
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn zero_value_for(col_type: &str) -> &'static str {
    let t = col_type.to_uppercase();
    if t.contains("INT") {
        "0"
    } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
        "0.0"
    } else {
        "''"
    }
}

/// Produce a filtered, integrity-hashed snapshot of `source_path` at
/// `dest_path`. The caller is responsible for validating `filter`
/// beforehand; this validates it again before touching the copy.
pub fn produce_snapshot(
    source_path: &Path,
    dest_path: &Path,
    filter: &FilterSpec,
) -> Result<SnapshotMeta, DbSyncError> {
    filter.validate()?;

    let tmp_path = std::path::PathBuf::from(format!("{}.snapshot.tmp", dest_path.display()));
    if tmp_path.exists() {
        std::fs::remove_file(&tmp_path)?;
    }

    // Step 2: VACUUM INTO a consistent point-in-time copy, no long read
    // lock held on the live source.
    {
        let source = Connection::open(source_path)?;
        source.execute(
            &format!("VACUUM INTO '{}'", tmp_path.display()),
            [],
        )?;
    }

    // Step 3: reopen the copy with pragmas safe for rewriting.
    let copy = Connection::open(&tmp_path)?;
    copy.pragma_update(None, "journal_mode", "WAL")?;
    copy.pragma_update(None, "foreign_keys", "OFF")?;
    copy.busy_timeout(Duration::from_secs(5))?;

    // Step 4: drop every user table outside the whitelist.
    let whitelist = filter.whitelist();
    for table in list_user_tables(&copy)? {
        if !whitelist.contains(&table) {
            copy.execute(&format!("DROP TABLE IF EXISTS \"{table}\""), [])?;
        }
    }

    // Step 5: row-level filtering.
    for (table, predicate) in &filter.filtered_tables {
        copy.execute(&format!("DELETE FROM \"{table}\" WHERE NOT ({predicate})"), [])?;
    }

    // Step 6: partial tables — optional row filter, then column nulling.
    for (table, spec) in &filter.partial_tables {
        if let Some(predicate) = &spec.where_clause {
            copy.execute(&format!("DELETE FROM \"{table}\" WHERE NOT ({predicate})"), [])?;
        }
        for (col_name, col_type, not_null) in column_info(&copy, table)? {
            if spec.columns.contains(&col_name) {
                continue;
            }
            let replacement = if not_null { zero_value_for(&col_type) } else { "NULL" };
            copy.execute(
                &format!("UPDATE \"{table}\" SET \"{col_name}\" = {replacement}"),
                [],
            )?;
        }
    }

    // Step 7: compact.
    copy.execute_batch("VACUUM")?;
    drop(copy);

    // Step 8: hash and rename into place.
    let mut file = std::fs::File::open(&tmp_path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    drop(file);
    let hash = hex::encode(hasher.finalize());

    std::fs::rename(&tmp_path, dest_path)?;

    Ok(SnapshotMeta {
        version: now_ms(),
        hash,
        size,
        timestamp: (now_ms() / 1000),
        compressed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::PartialTableSpec;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn setup_source(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE config (id INTEGER PRIMARY KEY, k TEXT, v TEXT);
             INSERT INTO config VALUES (1, 'a', '1');
             CREATE TABLE orders (id INTEGER PRIMARY KEY, status TEXT);
             INSERT INTO orders VALUES (1, 'open'), (2, 'closed');
             CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, email TEXT NOT NULL);
             INSERT INTO users VALUES (1, 'alice', 'alice@example.com');
             CREATE TABLE secrets (id INTEGER PRIMARY KEY, token TEXT);
             INSERT INTO secrets VALUES (1, 'shh');",
        )
        .unwrap();
    }

    #[test]
    fn filters_drops_and_nulls_as_specified() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.db");
        let dest_path = dir.path().join("snapshot.db");
        setup_source(&source_path);

        let mut filtered = HashMap::new();
        filtered.insert("orders".to_string(), "status = 'open'".to_string());
        let mut partial = HashMap::new();
        partial.insert(
            "users".to_string(),
            PartialTableSpec { columns: vec!["id".to_string(), "name".to_string()], where_clause: None },
        );

        let filter = FilterSpec {
            full_tables: vec!["config".to_string()],
            filtered_tables: filtered,
            partial_tables: partial,
        };

        let meta = produce_snapshot(&source_path, &dest_path, &filter).unwrap();
        assert!(dest_path.exists());
        assert_eq!(meta.size, std::fs::metadata(&dest_path).unwrap().len());

        let snap = Connection::open(&dest_path).unwrap();

        // secrets was outside the whitelist entirely.
        let table_exists: i64 = snap
            .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='secrets'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(table_exists, 0);

        // orders filtered down to the single matching row.
        let order_count: i64 = snap.query_row("SELECT COUNT(*) FROM orders", [], |r| r.get(0)).unwrap();
        assert_eq!(order_count, 1);

        // users.email nulled to its NOT NULL zero value since it's not in `columns`.
        let email: String = snap.query_row("SELECT email FROM users WHERE id = 1", [], |r| r.get(0)).unwrap();
        assert_eq!(email, "");

        let name: String = snap.query_row("SELECT name FROM users WHERE id = 1", [], |r| r.get(0)).unwrap();
        assert_eq!(name, "alice");
    }

    #[test]
    fn hash_matches_recomputed_hash_of_output_file() {
        let dir = tempdir().unwrap();
        let source_path = dir.path().join("source.db");
        let dest_path = dir.path().join("snapshot.db");
        setup_source(&source_path);

        let filter = FilterSpec { full_tables: vec!["config".to_string()], ..Default::default() };
        let meta = produce_snapshot(&source_path, &dest_path, &filter).unwrap();

        let bytes = std::fs::read(&dest_path).unwrap();
        let recomputed = hex::encode(Sha256::digest(&bytes));
        assert_eq!(meta.hash, recomputed);
    }
}
