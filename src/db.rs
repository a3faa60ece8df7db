use crate::rows::Row;
use rusqlite::{params, Connection};
use std::path::Path;

pub const DB_FILE_NAME: &str = "gradetreed.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_rows(
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            semester TEXT NOT NULL,
            course TEXT,
            path TEXT,
            weight REAL NOT NULL,
            grade REAL NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_rows_course ON grade_rows(semester, course)",
        [],
    )?;

    Ok(conn)
}

/// All rows in store order.
pub fn load_rows(conn: &Connection) -> anyhow::Result<Vec<Row>> {
    let mut stmt =
        conn.prepare("SELECT semester, course, path, weight, grade FROM grade_rows ORDER BY seq")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Row {
                semester: row.get(0)?,
                course: row.get(1)?,
                path: row.get(2)?,
                weight: row.get(3)?,
                grade: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Rewrite the whole table so that `seq` order matches `rows`.
pub fn replace_rows(conn: &mut Connection, rows: &[Row]) -> anyhow::Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM grade_rows", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO grade_rows(semester, course, path, weight, grade) VALUES(?, ?, ?, ?, ?)",
        )?;
        for r in rows {
            stmt.execute(params![r.semester, r.course, r.path, r.weight, r.grade])?;
        }
    }
    tx.commit()?;
    Ok(())
}
