use rusqlite::{Connection, Result};

/// Initialize the key-value table backing the state store
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_state (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    Ok(())
}

/// Run database migrations (for future schema updates)
pub fn run_migrations(conn: &Connection) -> Result<()> {
    initialize_schema(conn)
}
