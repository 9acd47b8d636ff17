use crate::error::Result;
use rusqlite::Connection;
use rusqlite::types::Value;
use std::path::Path;

pub fn run(file: &Path, sql: &str) -> Result<()> {
    let conn = Connection::open(file)?;
    for line in render(&conn, sql)? {
        println!("{}", line);
    }
    Ok(())
}

/// Header line followed by one tab-separated line per row
pub fn render(conn: &Connection, sql: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let column_count = stmt.column_count();
    let mut lines = vec![stmt.column_names().join("\t")];

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values: Vec<String> = (0..column_count)
            .map(|i| {
                row.get::<_, Value>(i)
                    .map(|v| format_value(&v))
                    .unwrap_or_else(|_| "NULL".to_string())
            })
            .collect();
        lines.push(values.join("\t"));
    }

    Ok(lines)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:.6}", f),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}
