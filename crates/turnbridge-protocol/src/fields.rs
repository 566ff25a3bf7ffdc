//! Defensive field extraction over raw notification params.
//!
//! Engines and protocol revisions disagree on field spellings; every lookup
//! takes an ordered candidate list (camelCase first) instead of repeating
//! fallback chains at each call site.

use serde_json::Value;

/// First non-null value found under any of `keys`, in order.
pub fn value_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let object = value.as_object()?;
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|candidate| !candidate.is_null())
}

/// First non-empty string found under any of `keys`.
pub fn string_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
}

pub fn u64_field(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(Value::as_u64)
}

pub fn f64_field(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(Value::as_f64)
}

pub fn bool_field(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(Value::as_bool)
}

/// Thread id under any historical spelling, including the nested
/// `thread.id` form some engines emit.
pub fn thread_id_field(params: &Value) -> Option<&str> {
    if let Some(thread_id) = string_field(params, &["threadId", "thread_id", "sessionId", "session_id"]) {
        return Some(thread_id);
    }
    params
        .get("thread")
        .and_then(|thread| thread.get("id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
}

/// Turn id under any historical spelling, including nested `turn.id`.
pub fn turn_id_field(params: &Value) -> Option<&str> {
    if let Some(turn_id) = string_field(params, &["turnId", "turn_id"]) {
        return Some(turn_id);
    }
    params
        .get("turn")
        .and_then(|turn| turn.get("id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
}
