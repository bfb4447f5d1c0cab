use crate::cli_args::ToolSetArgs;
use horos_contracts::now_ms;
use horos_registry::store;
use rusqlite::Connection;

pub fn list(conn: &Connection) -> anyhow::Result<()> {
    store::migrate(conn)?;
    let mut stmt = conn.prepare(
        "SELECT tool_name, handler_type, mode, is_active, version FROM dynamic_tools ORDER BY tool_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;
    for row in rows {
        let (name, handler_type, mode, is_active, version) = row?;
        println!("{name}\thandler_type={handler_type}\tmode={mode}\tactive={is_active}\tversion={version}");
    }
    Ok(())
}

pub fn set(conn: &Connection, args: &ToolSetArgs) -> anyhow::Result<()> {
    store::migrate(conn)?;
    serde_json::from_str::<serde_json::Value>(&args.handler_config)?;
    serde_json::from_str::<serde_json::Value>(&args.input_schema)?;
    let now = now_ms();
    conn.execute(
        "INSERT INTO dynamic_tools
            (tool_name, tool_category, description, input_schema, handler_type,
             handler_config, mode, is_active, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 1, ?8, ?8)
         ON CONFLICT(tool_name) DO UPDATE SET
            tool_category = excluded.tool_category,
            description = excluded.description,
            input_schema = excluded.input_schema,
            handler_type = excluded.handler_type,
            handler_config = excluded.handler_config,
            mode = excluded.mode",
        rusqlite::params![
            args.name,
            args.category,
            args.description,
            args.input_schema,
            args.handler_type,
            args.handler_config,
            args.mode,
            now,
        ],
    )?;
    println!("tool '{}' set", args.name);
    Ok(())
}

pub fn rm(conn: &Connection, name: &str) -> anyhow::Result<()> {
    store::migrate(conn)?;
    let n = conn.execute("DELETE FROM dynamic_tools WHERE tool_name = ?1", [name])?;
    println!("removed {n} tool(s)");
    Ok(())
}

pub fn history(conn: &Connection, name: &str) -> anyhow::Result<()> {
    store::migrate(conn)?;
    let mut stmt = conn.prepare(
        "SELECT version, change_reason, changed_at FROM dynamic_tools_history
         WHERE tool_name = ?1 ORDER BY version",
    )?;
    let rows = stmt.query_map([name], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
    })?;
    for row in rows {
        let (version, reason, changed_at) = row?;
        println!("v{version}\t{reason}\tchanged_at={changed_at}");
    }
    Ok(())
}
