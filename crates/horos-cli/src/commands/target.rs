use crate::cli_args::TargetSetArgs;
use horos_contracts::now_ms;
use horos_router::SqliteRouteStore;
use rusqlite::Connection;

/// DBSync targets are just `routes` rows under the `dbsync:` naming
/// convention, so no separate table is needed.
fn service_name(name: &str) -> String {
    format!("dbsync:{name}")
}

pub fn list(conn: &Connection) -> anyhow::Result<()> {
    SqliteRouteStore::migrate(conn)?;
    let mut stmt = conn.prepare(
        "SELECT service_name, strategy, endpoint FROM routes WHERE service_name LIKE 'dbsync:%' ORDER BY service_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, Option<String>>(2)?))
    })?;
    for row in rows {
        let (service, strategy, endpoint) = row?;
        let name = service.strip_prefix("dbsync:").unwrap_or(&service);
        println!("{name}\tstrategy={strategy}\tendpoint={:?}", endpoint);
    }
    Ok(())
}

pub fn set(conn: &Connection, args: &TargetSetArgs) -> anyhow::Result<()> {
    SqliteRouteStore::migrate(conn)?;
    conn.execute(
        "INSERT INTO routes (service_name, strategy, endpoint, config, updated_at)
         VALUES (?1, ?2, ?3, '{}', ?4)
         ON CONFLICT(service_name) DO UPDATE SET
            strategy = excluded.strategy,
            endpoint = excluded.endpoint,
            updated_at = excluded.updated_at",
        rusqlite::params![service_name(&args.name), args.strategy, args.endpoint, now_ms()],
    )?;
    println!("target '{}' set", args.name);
    Ok(())
}

pub fn rm(conn: &Connection, name: &str) -> anyhow::Result<()> {
    SqliteRouteStore::migrate(conn)?;
    let n = conn.execute("DELETE FROM routes WHERE service_name = ?1", [service_name(name)])?;
    println!("removed {n} target(s)");
    Ok(())
}
