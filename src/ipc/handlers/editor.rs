use crate::error::GradeError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_item_path, get_optional_f64, get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::session::EditSession;
use crate::tree::Item;
use serde_json::json;
use tracing::{debug, info};

fn session_view(session: &mut EditSession) -> serde_json::Value {
    let total = session.total();
    json!({
        "sessionId": session.id,
        "semester": session.semester,
        "course": session.course,
        "total": total,
        "items": session.hierarchy,
        "issues": session.issues,
        "dirty": session.dirty,
    })
}

/// The open session, checked against an optional `sessionId` param.
fn current_session<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut EditSession, HandlerErr> {
    let session = state.session.as_mut().ok_or(GradeError::NoSession)?;
    session.check_id(get_optional_str(&req.params, "sessionId"))?;
    Ok(session)
}

fn handle_session_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let semester = get_required_str(&req.params, "semester")?;
    let course = get_required_str(&req.params, "course")?;
    if let Some(prev) = state.session.take() {
        if prev.dirty {
            debug!(session = %prev.id, "discarding unsaved edits");
        }
    }
    let mut session = EditSession::open(&state.store, &semester, &course, state.max_depth);
    let view = session_view(&mut session);
    state.session = Some(session);
    Ok(view)
}

fn handle_session_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = current_session(state, req)?;
    Ok(session_view(session))
}

fn handle_session_close(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let session = current_session(state, req)?;
    let discarded = session.dirty;
    let id = session.id.clone();
    state.session = None;
    info!(session = %id, discarded, "course closed");
    Ok(json!({ "closed": true, "discardedChanges": discarded }))
}

fn handle_session_save(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let mut staged = state.store.clone();
    let written = current_session(state, req)?.stage(&mut staged);
    state
        .install_store(staged)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let session = current_session(state, req)?;
    session.mark_saved(written);
    Ok(json!({ "rowsWritten": written, "session": session_view(session) }))
}

fn handle_items_add(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let parent = get_item_path(&req.params, "parentPath")?;
    let name = get_required_str(&req.params, "name")?;
    let item = match get_optional_str(&req.params, "kind").unwrap_or("leaf") {
        "leaf" => Item::leaf(
            get_optional_f64(&req.params, "weight")?.unwrap_or(0.0),
            get_optional_f64(&req.params, "grade")?.unwrap_or(0.0),
        ),
        "category" => Item::category(),
        other => {
            return Err(HandlerErr::new("bad_params", "kind must be one of: leaf, category")
                .with_details(json!({ "kind": other })))
        }
    };
    let session = current_session(state, req)?;
    session.add(&parent, &name, item)?;
    Ok(session_view(session))
}

fn handle_items_rename(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = get_item_path(&req.params, "path")?;
    let new_name = get_required_str(&req.params, "newName")?;
    let session = current_session(state, req)?;
    session.rename(&path, &new_name)?;
    Ok(session_view(session))
}

fn handle_items_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = get_item_path(&req.params, "path")?;
    let session = current_session(state, req)?;
    session.delete(&path)?;
    Ok(session_view(session))
}

fn handle_items_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let path = get_item_path(&req.params, "path")?;
    let weight = get_optional_f64(&req.params, "weight")?;
    let grade = get_optional_f64(&req.params, "grade")?;
    let session = current_session(state, req)?;
    session.update(&path, weight, grade)?;
    Ok(session_view(session))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "session.open" => handle_session_open(state, req),
        "session.get" => handle_session_get(state, req),
        "session.close" => handle_session_close(state, req),
        "session.save" => handle_session_save(state, req),
        "items.add" => handle_items_add(state, req),
        "items.rename" => handle_items_rename(state, req),
        "items.delete" => handle_items_delete(state, req),
        "items.update" => handle_items_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
