use crate::error::Result;
use crate::storage::get_meta;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

/// Recording info extracted from a database file
#[derive(Debug, Clone)]
pub struct RecordingInfo {
    pub path: PathBuf,
    pub process_name: String,
    pub duration_secs: f64,
    pub drains: u64,
    pub calls: u64,
    pub created: String,
}

/// Find all calltime recordings in a directory, most recent first
pub fn find_recordings(dir: &Path) -> Result<Vec<RecordingInfo>> {
    let mut recordings = Vec::new();

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with("calltime.")
            && name.ends_with(".db")
            && let Ok(info) = recording_info(&path)
        {
            recordings.push(info);
        }
    }

    recordings.sort_by(|a, b| b.created.cmp(&a.created));
    Ok(recordings)
}

fn recording_info(path: &Path) -> Result<RecordingInfo> {
    let conn = Connection::open(path)?;

    let process_name = get_meta(&conn, "process_name")?.unwrap_or_else(|| "unknown".to_string());
    let created = get_meta(&conn, "start_time")?.unwrap_or_else(|| "unknown".to_string());

    let (duration_ms, drains): (i64, i64) = conn.query_row(
        "SELECT COALESCE(MAX(timestamp_ms), 0), COUNT(*) FROM drains",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let calls: i64 = conn.query_row(
        "SELECT COALESCE(SUM(calls), 0) FROM call_stats",
        [],
        |row| row.get(0),
    )?;

    Ok(RecordingInfo {
        path: path.to_path_buf(),
        process_name,
        duration_secs: duration_ms as f64 / 1000.0,
        drains: drains as u64,
        calls: calls as u64,
        created,
    })
}

pub fn run(dir: Option<&Path>) -> Result<()> {
    let search_dir = dir.unwrap_or_else(|| Path::new("."));
    let recordings = find_recordings(search_dir)?;

    if recordings.is_empty() {
        println!("No calltime recordings found in {}", search_dir.display());
        return Ok(());
    }

    println!(
        "{:<44} {:>12} {:>10} {:>8} {:>12}",
        "FILE", "PROCESS", "DURATION", "DRAINS", "CALLS"
    );
    println!("{}", "-".repeat(90));

    for recording in recordings {
        let filename = recording
            .path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        let duration = if recording.duration_secs >= 60.0 {
            format!(
                "{:.0}m{:.0}s",
                (recording.duration_secs / 60.0).floor(),
                recording.duration_secs % 60.0
            )
        } else {
            format!("{:.1}s", recording.duration_secs)
        };

        println!(
            "{:<44} {:>12} {:>10} {:>8} {:>12}",
            filename, recording.process_name, duration, recording.drains, recording.calls
        );
    }

    Ok(())
}
