use super::schema::{self, SCHEMA_VERSION};
use crate::error::Result;
use calltime_probe::clock::TICKS_PER_SECOND;
use calltime_probe::{ReportSink, StatSnapshot};
use rusqlite::Connection;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// SQLite recorder for drained snapshots
pub struct Storage {
    conn: Connection,
    start_time: Instant,
    /// Cache: function name -> functions.id
    function_cache: HashMap<String, i64>,
}

impl Storage {
    /// Create a new recording, replacing any tables already in `path`
    pub fn new(path: &Path, process_name: &str) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL so `top` and `query` can read while the host keeps writing
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;

        schema::create_tables(&conn)?;

        schema::set_meta(&conn, "version", &SCHEMA_VERSION.to_string())?;
        schema::set_meta(&conn, "pid", &std::process::id().to_string())?;
        schema::set_meta(&conn, "process_name", process_name)?;
        schema::set_meta(&conn, "start_time", &chrono::Utc::now().to_rfc3339())?;
        schema::set_meta(&conn, "ticks_per_second", &TICKS_PER_SECOND.to_string())?;

        Ok(Storage {
            conn,
            start_time: Instant::now(),
            function_cache: HashMap::new(),
        })
    }

    /// `calltime.<name>.<yymmddHHMMSS>.db` in `dir`
    pub fn default_path(dir: &Path, process_name: &str) -> PathBuf {
        let timestamp = chrono::Local::now().format("%y%m%d%H%M%S");
        let name: String = process_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .take(32)
            .collect();
        dir.join(format!("calltime.{}.{}.db", name, timestamp))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Store one snapshot as a drain; returns the drain id.
    ///
    /// Functions that were not called are left out. Functions sharing a
    /// display name are summed into one row.
    pub fn write_snapshot(&mut self, snapshot: &StatSnapshot) -> Result<i64> {
        let timestamp_ms = self.start_time.elapsed().as_millis() as i64;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO drains (timestamp_ms, generation) VALUES (?, ?)",
            rusqlite::params![timestamp_ms, snapshot.generation() as i64],
        )?;
        let drain_id = tx.last_insert_rowid();

        let mut written = 0usize;
        let mut new_functions = HashMap::new();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO call_stats (drain_id, function_id, calls, total_ns, max_ns, exceptions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (drain_id, function_id) DO UPDATE SET
                     calls = calls + excluded.calls,
                     total_ns = total_ns + excluded.total_ns,
                     max_ns = MAX(max_ns, excluded.max_ns),
                     exceptions = exceptions + excluded.exceptions",
            )?;

            for row in snapshot.rows().iter().filter(|r| r.calls > 0) {
                let function_id =
                    function_id(&tx, &self.function_cache, &mut new_functions, &row.name)?;
                stmt.execute(rusqlite::params![
                    drain_id,
                    function_id,
                    row.calls as i64,
                    duration_ns(row.total),
                    duration_ns(row.max),
                    row.exceptions as i64,
                ])?;
                written += 1;
            }
        }

        tx.commit()?;
        // only ids whose rows are committed may be cached
        self.function_cache.extend(new_functions);
        debug!(drain_id, functions = written, "stored snapshot");
        Ok(drain_id)
    }

    pub fn drain_count(&self) -> Result<u64> {
        query_drain_count(&self.conn)
    }
}

impl ReportSink for Storage {
    fn publish(&mut self, snapshot: &StatSnapshot) -> std::result::Result<(), Box<dyn StdError + Send + Sync>> {
        self.write_snapshot(snapshot)?;
        Ok(())
    }
}

fn function_id(
    conn: &Connection,
    cache: &HashMap<String, i64>,
    pending: &mut HashMap<String, i64>,
    name: &str,
) -> rusqlite::Result<i64> {
    if let Some(&id) = cache.get(name).or_else(|| pending.get(name)) {
        return Ok(id);
    }

    conn.execute("INSERT OR IGNORE INTO functions (name) VALUES (?)", [name])?;
    let id: i64 = conn.query_row("SELECT id FROM functions WHERE name = ?", [name], |row| {
        row.get(0)
    })?;

    pending.insert(name.to_string(), id);
    Ok(id)
}

fn duration_ns(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}

/// Column a `top` report is ordered by, largest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Total,
    Calls,
    Max,
    Exceptions,
}

impl SortKey {
    fn column(self) -> &'static str {
        match self {
            SortKey::Total => "sum_total_ns",
            SortKey::Calls => "sum_calls",
            SortKey::Max => "peak_ns",
            SortKey::Exceptions => "sum_exceptions",
        }
    }
}

/// Totals for one function across drains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEntry {
    pub name: String,
    pub calls: u64,
    pub total_ns: u64,
    pub max_ns: u64,
    pub exceptions: u64,
}

impl CallEntry {
    pub fn mean_ns(&self) -> u64 {
        self.total_ns.checked_div(self.calls).unwrap_or(0)
    }
}

/// Top functions summed over every drain
pub fn query_top_calls(conn: &Connection, limit: usize, sort: SortKey) -> Result<Vec<CallEntry>> {
    query_top_calls_since(conn, limit, sort, None)
}

/// Top functions over drains taken within `window` of the last drain
pub fn query_top_calls_since(
    conn: &Connection,
    limit: usize,
    sort: SortKey,
    window: Option<Duration>,
) -> Result<Vec<CallEntry>> {
    let min_timestamp_ms = match window {
        Some(window) => {
            let last = query_duration_ms(conn)?.unwrap_or(0);
            last.saturating_sub(window.as_millis() as i64)
        }
        None => i64::MIN,
    };

    let sql = format!(
        r#"
        SELECT f.name,
               SUM(s.calls) AS sum_calls,
               SUM(s.total_ns) AS sum_total_ns,
               MAX(s.max_ns) AS peak_ns,
               SUM(s.exceptions) AS sum_exceptions
        FROM call_stats s
        JOIN functions f ON f.id = s.function_id
        JOIN drains d ON d.id = s.drain_id
        WHERE d.timestamp_ms >= ?1
        GROUP BY f.id
        ORDER BY {} DESC, f.name ASC
        LIMIT ?2
        "#,
        sort.column()
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![min_timestamp_ms, limit as i64], |row| {
        Ok(CallEntry {
            name: row.get(0)?,
            calls: row.get::<_, i64>(1)? as u64,
            total_ns: row.get::<_, i64>(2)? as u64,
            max_ns: row.get::<_, i64>(3)? as u64,
            exceptions: row.get::<_, i64>(4)? as u64,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn query_drain_count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM drains", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Timestamp of the last drain, relative to the start of recording
pub fn query_duration_ms(conn: &Connection) -> Result<Option<i64>> {
    let ms: Option<i64> =
        conn.query_row("SELECT MAX(timestamp_ms) FROM drains", [], |row| row.get(0))?;
    Ok(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use calltime_probe::{MethodRegistry, TargetId, TrackedId};

    fn snapshot_with(calls: Vec<(u64, &str, Vec<i64>)>) -> StatSnapshot {
        let registry = MethodRegistry::new();
        for &(target, name, _) in &calls {
            registry.register(TargetId(target), name);
        }
        let stats = registry.stats();
        for (idx, (_, _, samples)) in calls.iter().enumerate() {
            for &ticks in samples {
                stats.record_in(registry.generation(), TrackedId(idx as u32), ticks, false);
            }
        }
        stats.snapshot()
    }

    #[test]
    fn test_write_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::new(&dir.path().join("t.db"), "game").unwrap();

        storage
            .write_snapshot(&snapshot_with(vec![(1, "Bar.Execute", vec![100, 300]), (2, "Bar.Reset", vec![])]))
            .unwrap();
        storage
            .write_snapshot(&snapshot_with(vec![(1, "Bar.Execute", vec![500])]))
            .unwrap();

        assert_eq!(storage.drain_count().unwrap(), 2);
        let top = query_top_calls(storage.connection(), 10, SortKey::Total).unwrap();
        assert_eq!(
            top,
            vec![CallEntry {
                name: "Bar.Execute".to_string(),
                calls: 3,
                total_ns: 900,
                max_ns: 500,
                exceptions: 0,
            }]
        );
        assert_eq!(top[0].mean_ns(), 300);
    }

    #[test]
    fn test_equal_names_are_summed() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::new(&dir.path().join("t.db"), "game").unwrap();
        storage
            .write_snapshot(&snapshot_with(vec![(1, "Vec.push", vec![10]), (2, "Vec.push", vec![30])]))
            .unwrap();

        let top = query_top_calls(storage.connection(), 10, SortKey::Calls).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!((top[0].calls, top[0].total_ns, top[0].max_ns), (2, 40, 30));
    }

    #[test]
    fn test_failed_drain_leaves_no_stale_function_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::new(&dir.path().join("t.db"), "game").unwrap();
        storage
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_thirteen BEFORE INSERT ON call_stats
                 WHEN NEW.calls = 13 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let failing = snapshot_with(vec![(1, "Bar.Execute", vec![1000]), (2, "Bar.Reset", vec![1; 13])]);
        assert!(matches!(storage.write_snapshot(&failing), Err(Error::Database(_))));
        assert_eq!(storage.drain_count().unwrap(), 0);

        storage.connection().execute_batch("DROP TRIGGER reject_thirteen;").unwrap();
        storage
            .write_snapshot(&snapshot_with(vec![(1, "Bar.Execute", vec![40])]))
            .unwrap();

        let top = query_top_calls(storage.connection(), 10, SortKey::Total).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!((top[0].name.as_str(), top[0].calls), ("Bar.Execute", 1));
    }

    #[test]
    fn test_sort_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = Storage::new(&dir.path().join("t.db"), "game").unwrap();
        storage
            .write_snapshot(&snapshot_with(vec![
                (1, "many", vec![1, 1, 1, 1]),
                (2, "slow", vec![1000]),
                (3, "wide", vec![400, 400]),
            ]))
            .unwrap();

        let names = |sort| -> Vec<String> {
            query_top_calls(storage.connection(), 10, sort)
                .unwrap()
                .into_iter()
                .map(|e| e.name)
                .collect()
        };
        assert_eq!(names(SortKey::Total), vec!["slow", "wide", "many"]);
        assert_eq!(names(SortKey::Calls), vec!["many", "wide", "slow"]);
        assert_eq!(names(SortKey::Max), vec!["slow", "wide", "many"]);
        // all zero: ties broken by name
        assert_eq!(names(SortKey::Exceptions), vec!["many", "slow", "wide"]);

        assert_eq!(query_top_calls(storage.connection(), 1, SortKey::Total).unwrap().len(), 1);
    }

    #[test]
    fn test_storage_as_report_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut sink: Box<dyn ReportSink> = Box::new(Storage::new(&path, "game").unwrap());
        sink.publish(&snapshot_with(vec![(1, "a.b", vec![5])])).unwrap();
        drop(sink);

        let conn = Connection::open(&path).unwrap();
        assert_eq!(query_drain_count(&conn).unwrap(), 1);
        assert_eq!(
            schema::get_meta(&conn, "process_name").unwrap().as_deref(),
            Some("game")
        );
    }

    #[test]
    fn test_default_path() {
        let path = Storage::default_path(Path::new("/tmp"), "my game");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("calltime.my-game."));
        assert!(name.ends_with(".db"));
    }
}
