use crate::cli_args::RouteSetArgs;
use horos_contracts::now_ms;
use horos_router::SqliteRouteStore;
use rusqlite::Connection;

pub fn list(conn: &Connection) -> anyhow::Result<()> {
    SqliteRouteStore::migrate(conn)?;
    let mut stmt = conn.prepare(
        "SELECT service_name, strategy, endpoint, config, updated_at FROM routes ORDER BY service_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;
    for row in rows {
        let (service, strategy, endpoint, config, updated_at) = row?;
        println!("{service}\tstrategy={strategy}\tendpoint={:?}\tconfig={config}\tupdated_at={updated_at}", endpoint);
    }
    Ok(())
}

pub fn set(conn: &Connection, args: &RouteSetArgs) -> anyhow::Result<()> {
    SqliteRouteStore::migrate(conn)?;
    serde_json::from_str::<serde_json::Value>(&args.config)?;
    conn.execute(
        "INSERT INTO routes (service_name, strategy, endpoint, config, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(service_name) DO UPDATE SET
            strategy = excluded.strategy,
            endpoint = excluded.endpoint,
            config = excluded.config,
            updated_at = excluded.updated_at",
        rusqlite::params![args.service_name, args.strategy, args.endpoint, args.config, now_ms()],
    )?;
    println!("route '{}' set", args.service_name);
    Ok(())
}

pub fn rm(conn: &Connection, service_name: &str) -> anyhow::Result<()> {
    SqliteRouteStore::migrate(conn)?;
    let n = conn.execute("DELETE FROM routes WHERE service_name = ?1", [service_name])?;
    println!("removed {n} route(s)");
    Ok(())
}
