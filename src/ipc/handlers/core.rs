use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::get_required_path;
use crate::ipc::types::{AppState, Request};
use crate::rows::RowStore;
use serde_json::json;
use std::path::Path;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(
        &req.id,
        Ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "rowCount": state.store.len(),
            "sessionOpen": state.session.is_some(),
        })),
    )
}

/// Open (or create) a workspace database and load its rows.
///
/// An empty workspace adopts whatever rows are already in memory, so starting
/// from scratch and choosing a folder afterwards keeps the work.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<usize> {
    let mut conn = db::open_db(path)?;
    let stored = db::load_rows(&conn)?;
    if stored.is_empty() {
        db::replace_rows(&mut conn, state.store.rows())?;
    } else {
        state.store = RowStore::from_rows(stored);
        state.session = None;
    }
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    info!(workspace = %path.display(), rows = state.store.len(), "workspace opened");
    Ok(state.store.len())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result = get_required_path(&req.params, "path").and_then(|path| {
        let row_count = open_workspace(state, &path).map_err(|e| {
            HandlerErr::new("db_open_failed", format!("{e:?}"))
                .with_details(json!({ "path": path.to_string_lossy() }))
        })?;
        Ok(json!({
            "workspacePath": path.to_string_lossy(),
            "rowCount": row_count,
        }))
    });
    respond(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
