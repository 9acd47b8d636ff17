use crate::error::Result;
use crate::storage::{
    CallEntry, SortKey, query_drain_count, query_duration_ms, query_top_calls_since,
};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub fn run(
    file: &Path,
    limit: usize,
    sort: SortKey,
    since: Option<Duration>,
    json: bool,
    csv: bool,
) -> Result<()> {
    let conn = Connection::open(file)?;

    let duration_ms = query_duration_ms(&conn)?;
    let drains = query_drain_count(&conn)?;
    let entries = query_top_calls_since(&conn, limit, sort, since)?;

    if json {
        print_json(file, duration_ms, drains, &entries);
    } else if csv {
        print_csv(&entries);
    } else {
        print_table(file, duration_ms, drains, &entries);
    }

    Ok(())
}

fn print_table(file: &Path, duration_ms: Option<i64>, drains: u64, entries: &[CallEntry]) {
    println!("# {}", file.display());
    if let Some(ms) = duration_ms {
        let secs = ms / 1000;
        println!(
            "# Duration: {}m{:02}s | Drains: {}",
            secs / 60,
            secs % 60,
            drains
        );
    }
    println!();

    if entries.is_empty() {
        println!("No calls recorded.");
        return;
    }

    println!(
        "{:>12}  {:>10}  {:>10}  {:>10}  {:>6}  FUNCTION",
        "CALLS", "TOTAL", "MEAN", "MAX", "FAULTS"
    );
    println!("{}", "-".repeat(80));

    for entry in entries {
        println!(
            "{:>12}  {:>10}  {:>10}  {:>10}  {:>6}  {}",
            format_count(entry.calls),
            format_ns(entry.total_ns),
            format_ns(entry.mean_ns()),
            format_ns(entry.max_ns),
            entry.exceptions,
            entry.name
        );
    }
}

fn print_json(file: &Path, duration_ms: Option<i64>, drains: u64, entries: &[CallEntry]) {
    println!("{{");
    println!("  \"file\": \"{}\",", escape_json(&file.display().to_string()));
    if let Some(ms) = duration_ms {
        println!("  \"duration_ms\": {},", ms);
    }
    println!("  \"drains\": {},", drains);
    println!("  \"entries\": [");

    for (i, entry) in entries.iter().enumerate() {
        let comma = if i + 1 < entries.len() { "," } else { "" };
        println!(
            "    {{ \"calls\": {}, \"total_ns\": {}, \"mean_ns\": {}, \"max_ns\": {}, \"exceptions\": {}, \"function\": \"{}\" }}{}",
            entry.calls,
            entry.total_ns,
            entry.mean_ns(),
            entry.max_ns,
            entry.exceptions,
            escape_json(&entry.name),
            comma
        );
    }

    println!("  ]");
    println!("}}");
}

fn print_csv(entries: &[CallEntry]) {
    println!("calls,total_ns,mean_ns,max_ns,exceptions,function");
    for entry in entries {
        println!(
            "{},{},{},{},{},\"{}\"",
            entry.calls,
            entry.total_ns,
            entry.mean_ns(),
            entry.max_ns,
            entry.exceptions,
            entry.name.replace('"', "\"\"")
        );
    }
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Nanoseconds with a unit picked for readability
fn format_ns(ns: u64) -> String {
    let ns_f = ns as f64;
    if ns >= 1_000_000_000 {
        format!("{:.2}s", ns_f / 1e9)
    } else if ns >= 1_000_000 {
        format!("{:.2}ms", ns_f / 1e6)
    } else if ns >= 1_000 {
        format!("{:.1}us", ns_f / 1e3)
    } else {
        format!("{}ns", ns)
    }
}

/// Format a number with commas for readability
fn format_count(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ns() {
        assert_eq!(format_ns(0), "0ns");
        assert_eq!(format_ns(999), "999ns");
        assert_eq!(format_ns(1_500), "1.5us");
        assert_eq!(format_ns(2_340_000), "2.34ms");
        assert_eq!(format_ns(3_000_000_000), "3.00s");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
