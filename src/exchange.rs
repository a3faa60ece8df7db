use crate::error::GradeError;
use crate::rows::Row;
use anyhow::Context;
use std::collections::HashMap;
use std::path::Path;

pub const HEADER: [&str; 5] = ["Semester", "Course", "Path", "Weight", "Grade"];

/// Split delimited text into records, honoring quoted fields that span lines.
/// Each record carries the 1-based line number it started on.
fn parse_csv_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut out: Vec<(usize, Vec<String>)> = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut line_no = 1usize;
    let mut record_start = 1usize;
    let chars: Vec<char> = text.trim_start_matches('\u{feff}').chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '"' {
            if in_quotes && i + 1 < chars.len() && chars[i + 1] == '"' {
                buf.push('"');
                i += 2;
                continue;
            }
            in_quotes = !in_quotes;
            i += 1;
            continue;
        }
        if ch == ',' && !in_quotes {
            fields.push(std::mem::take(&mut buf));
            i += 1;
            continue;
        }
        if (ch == '\n' || ch == '\r') && !in_quotes {
            if ch == '\r' && i + 1 < chars.len() && chars[i + 1] == '\n' {
                i += 1;
            }
            fields.push(std::mem::take(&mut buf));
            if !(fields.len() == 1 && fields[0].trim().is_empty()) {
                out.push((record_start, std::mem::take(&mut fields)));
            }
            fields.clear();
            line_no += 1;
            record_start = line_no;
            i += 1;
            continue;
        }
        if ch == '\n' {
            line_no += 1;
        }
        buf.push(ch);
        i += 1;
    }
    if !buf.is_empty() || !fields.is_empty() {
        fields.push(buf);
        if !(fields.len() == 1 && fields[0].trim().is_empty()) {
            out.push((record_start, fields));
        }
    }
    out
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn optional_text(fields: &[String], col: usize) -> Option<String> {
    fields
        .get(col)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn number(fields: &[String], col: usize, line: usize, column: &str) -> Result<f64, GradeError> {
    let raw = fields.get(col).map(|s| s.trim()).unwrap_or("");
    if raw.is_empty() {
        return Ok(0.0);
    }
    match raw.parse::<f64>() {
        // SQLite has no NaN and the store would no longer persist.
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(GradeError::Parse {
            line,
            message: format!("{column} is not a finite number: {raw:?}"),
        }),
    }
}

/// Parse the five-column exchange format. Columns are located by header name
/// (case-insensitive) and fall back to canonical order.
pub fn parse_rows_csv(text: &str) -> Result<Vec<Row>, GradeError> {
    let mut records = parse_csv_records(text).into_iter();
    let Some((_, header_fields)) = records.next() else {
        return Ok(Vec::new());
    };

    let mut idx = HashMap::<String, usize>::new();
    for (i, f) in header_fields.iter().enumerate() {
        idx.insert(f.trim().to_ascii_lowercase(), i);
    }
    let col = |name: &str, fallback: usize| {
        idx.get(&name.to_ascii_lowercase())
            .copied()
            .unwrap_or(fallback)
    };
    let semester_col = col(HEADER[0], 0);
    let course_col = col(HEADER[1], 1);
    let path_col = col(HEADER[2], 2);
    let weight_col = col(HEADER[3], 3);
    let grade_col = col(HEADER[4], 4);

    let mut rows = Vec::new();
    for (line, fields) in records {
        rows.push(Row {
            semester: optional_text(&fields, semester_col).unwrap_or_default(),
            course: optional_text(&fields, course_col),
            path: optional_text(&fields, path_col),
            weight: number(&fields, weight_col, line, HEADER[3])?,
            grade: number(&fields, grade_col, line, HEADER[4])?,
        });
    }
    Ok(rows)
}

pub fn rows_to_csv(rows: &[Row]) -> String {
    let mut csv = HEADER.join(",");
    csv.push('\n');
    for r in rows {
        csv.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_quote(&r.semester),
            csv_quote(r.course.as_deref().unwrap_or("")),
            csv_quote(r.path.as_deref().unwrap_or("")),
            r.weight,
            r.grade
        ));
    }
    csv
}

pub fn read_rows_csv(path: &Path) -> anyhow::Result<Vec<Row>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
    let rows = parse_rows_csv(&text)
        .with_context(|| format!("failed to parse {}", path.to_string_lossy()))?;
    Ok(rows)
}

pub fn write_rows_csv(path: &Path, rows: &[Row]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    std::fs::write(path, rows_to_csv(rows))
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(())
}
