use rusqlite::Connection;

pub const SCHEMA_VERSION: i32 = 1;

/// Create all tables, dropping any left over from an earlier session
pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS call_stats;
        DROP TABLE IF EXISTS functions;
        DROP TABLE IF EXISTS drains;
        DROP TABLE IF EXISTS meta;

        CREATE TABLE meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- One row per delivered snapshot
        CREATE TABLE drains (
            id INTEGER PRIMARY KEY,
            timestamp_ms INTEGER NOT NULL,
            generation INTEGER NOT NULL
        );

        -- Display names; overloads with equal names share a row
        CREATE TABLE functions (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE call_stats (
            drain_id INTEGER NOT NULL,
            function_id INTEGER NOT NULL,
            calls INTEGER NOT NULL,
            total_ns INTEGER NOT NULL,
            max_ns INTEGER NOT NULL,
            exceptions INTEGER NOT NULL,
            PRIMARY KEY (drain_id, function_id),
            FOREIGN KEY (drain_id) REFERENCES drains(id),
            FOREIGN KEY (function_id) REFERENCES functions(id)
        );

        CREATE INDEX idx_call_stats_function ON call_stats(function_id);
        "#,
    )
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES (?, ?)",
        [key, value],
    )?;
    Ok(())
}

pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
        row.get(0)
    })
    .optional()
}

pub(crate) trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
