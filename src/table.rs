use crate::error::Result;
use std::fs;
use std::path::Path;

/// Render rows as comma-delimited text with no header.
/// Fields containing a delimiter, quote, or line break are quoted with inner quotes doubled.
pub fn render_rows(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        let line: Vec<String> = row.iter().map(|f| quote_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write the whole table in one go, replacing any existing file.
pub fn write_rows(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, render_rows(rows))?;
    Ok(())
}
