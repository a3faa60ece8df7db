use crate::ipc::error::HandlerErr;
use crate::tree::PATH_SEPARATOR;
use serde_json::Value;
use std::path::PathBuf;

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub fn get_required_path(params: &Value, key: &str) -> Result<PathBuf, HandlerErr> {
    get_required_str(params, key).map(PathBuf::from)
}

/// Optional number; present-but-not-numeric or non-finite is rejected.
pub fn get_optional_f64(params: &Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| {
                HandlerErr::new("bad_params", format!("{} must be a finite number", key))
                    .with_details(serde_json::json!({ key: v }))
            }),
    }
}

/// Item address: an array of names from the root, or a slash-joined string.
/// Missing means the root.
pub fn get_item_path(params: &Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(s
            .split(PATH_SEPARATOR)
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .collect()),
        Some(Value::Array(parts)) => parts
            .iter()
            .map(|p| {
                p.as_str().map(|s| s.to_string()).ok_or_else(|| {
                    HandlerErr::new("bad_params", format!("{} must contain only strings", key))
                })
            })
            .collect(),
        Some(_) => Err(HandlerErr::new(
            "bad_params",
            format!("{} must be an array of names", key),
        )),
    }
}
