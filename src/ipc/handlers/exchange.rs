use crate::backup;
use crate::error::GradeError;
use crate::exchange;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_str, get_required_path};
use crate::ipc::types::{AppState, Request};
use crate::rows::{Row, RowStore};
use serde_json::json;
use std::path::Path;
use tracing::info;

fn import_failed(e: anyhow::Error, path: &Path) -> HandlerErr {
    let mut details = json!({ "path": path.to_string_lossy() });
    if let Some(GradeError::Parse { line, .. }) = e.downcast_ref::<GradeError>() {
        details["line"] = json!(line);
    }
    HandlerErr::new("import_failed", format!("{e:#}")).with_details(details)
}

fn export_failed(e: anyhow::Error, path: &Path) -> HandlerErr {
    HandlerErr::new("export_failed", format!("{e:#}"))
        .with_details(json!({ "path": path.to_string_lossy() }))
}

/// Swap in a new table. Any open course is dropped since its rows may be gone.
/// Nothing changes if the workspace cannot take the new rows.
fn install_rows(state: &mut AppState, rows: Vec<Row>) -> Result<usize, HandlerErr> {
    state
        .install_store(RowStore::from_rows(rows))
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    if state.session.take().is_some() {
        info!("open course discarded after import");
    }
    Ok(state.store.len())
}

fn handle_rows_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let semester = get_optional_str(&req.params, "semester");
    let course = get_optional_str(&req.params, "course");
    let rows: Vec<&Row> = state
        .store
        .rows()
        .iter()
        .filter(|r| semester.map(|s| r.semester == s).unwrap_or(true))
        .filter(|r| course.map(|c| r.course.as_deref() == Some(c)).unwrap_or(true))
        .collect();
    Ok(json!({ "rows": rows }))
}

fn handle_rows_import_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let in_path = get_required_path(&req.params, "inPath")?;
    let rows = exchange::read_rows_csv(&in_path).map_err(|e| import_failed(e, &in_path))?;
    let row_count = install_rows(state, rows)?;
    info!(path = %in_path.display(), rows = row_count, "rows imported");
    Ok(json!({ "rowCount": row_count }))
}

fn handle_rows_export_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_path(&req.params, "outPath")?;
    exchange::write_rows_csv(&out_path, state.store.rows())
        .map_err(|e| export_failed(e, &out_path))?;
    info!(path = %out_path.display(), rows = state.store.len(), "rows exported");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "rowCount": state.store.len(),
    }))
}

fn handle_backup_export(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let out_path = get_required_path(&req.params, "outPath")?;
    let export = backup::export_rows_bundle(state.store.rows(), &out_path)
        .map_err(|e| export_failed(e, &out_path))?;
    info!(path = %out_path.display(), rows = export.row_count, "backup exported");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": export.bundle_format,
        "rowCount": export.row_count,
        "rowsSha256": export.rows_sha256,
    }))
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let in_path = get_required_path(&req.params, "inPath")?;
    if !in_path.is_file() {
        return Err(HandlerErr::new("not_found", "backup file not found")
            .with_details(json!({ "path": in_path.to_string_lossy() })));
    }
    let import = backup::import_rows_bundle(&in_path).map_err(|e| import_failed(e, &in_path))?;
    let row_count = install_rows(state, import.rows)?;
    info!(
        path = %in_path.display(),
        format = %import.bundle_format_detected,
        rows = row_count,
        "backup restored"
    );
    Ok(json!({
        "bundleFormatDetected": import.bundle_format_detected,
        "rowCount": row_count,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "rows.list" => handle_rows_list(state, req),
        "rows.importCsv" => handle_rows_import_csv(state, req),
        "rows.exportCsv" => handle_rows_export_csv(state, req),
        "backup.export" => handle_backup_export(state, req),
        "backup.import" => handle_backup_import(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
