use crate::error::GradeError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::rows::{is_placeholder, RowStore};
use serde_json::json;
use tracing::info;

/// Term and course names that would be read back as empty cells.
fn listable_name(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    let name = get_required_str(params, key)?;
    if is_placeholder(Some(name.as_str())) {
        return Err(GradeError::ReservedName(name).into());
    }
    Ok(name)
}

fn install(state: &mut AppState, staged: RowStore) -> Result<(), HandlerErr> {
    state
        .install_store(staged)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))
}

fn handle_terms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, Ok(json!({ "terms": state.store.terms() })))
}

fn handle_terms_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = listable_name(&req.params, "name")?;
    let exists = state.store.terms().iter().any(|t| *t == name);
    if !exists {
        let mut staged = state.store.clone();
        staged.create_term(&name);
        install(state, staged)?;
        info!(term = %name, "term created");
    }
    Ok(json!({ "name": name, "created": !exists }))
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let semester = get_required_str(&req.params, "semester")?;
    let courses = state.store.courses(&semester);
    Ok(json!({ "semester": semester, "courses": courses }))
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let semester = listable_name(&req.params, "semester")?;
    let name = listable_name(&req.params, "name")?;
    let exists = state.store.courses(&semester).iter().any(|c| *c == name);
    if !exists {
        let mut staged = state.store.clone();
        staged.create_course(&semester, &name);
        install(state, staged)?;
        info!(term = %semester, course = %name, "course created");
    }
    Ok(json!({ "semester": semester, "name": name, "created": !exists }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "terms.list" => Some(handle_terms_list(state, req)),
        "terms.create" => Some(respond(&req.id, handle_terms_create(state, req))),
        "courses.list" => Some(respond(&req.id, handle_courses_list(state, req))),
        "courses.create" => Some(respond(&req.id, handle_courses_create(state, req))),
        _ => None,
    }
}
