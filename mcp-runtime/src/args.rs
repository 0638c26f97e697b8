//! Typed accessors over raw `tools/call` arguments. Every failure is a
//! `validation_failed` tool error naming the offending field.

use arc_mcp_core::QueryOptions;
use serde_json::{Map, Value};

use crate::error::ToolError;

pub const DEFAULT_HOURS: u32 = 24;
pub const MAX_HOURS: u64 = 24 * 365;
pub const DEFAULT_LIST_TOP: u64 = 50;
pub const DEFAULT_RECENT_TOP: u64 = 100;

pub fn arg_bool(args: &Map<String, Value>, key: &str, default: bool) -> Result<bool, ToolError> {
    Ok(arg_optional_bool(args, key)?.unwrap_or(default))
}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args
        .get(key)
        .filter(|value| !value.is_null())
        .ok_or_else(|| ToolError::validation(key, format!("Missing required field '{key}'")))?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Value::String(_) => Err(ToolError::validation(
            key,
            format!("'{key}' must not be empty"),
        )),
        _ => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

pub fn arg_optional_string(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.trim().to_string())),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

/// Like [`arg_optional_string`] but keeps surrounding whitespace, for payloads
/// such as file content where it is significant.
pub fn arg_optional_raw_string(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<String>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(v)) => Ok(Some(v.clone())),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

pub fn arg_optional_bool(args: &Map<String, Value>, key: &str) -> Result<Option<bool>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(v)) => Ok(Some(*v)),
        Some(Value::String(s)) => arc_mcp_core::fields::parse_flag(s)
            .map(Some)
            .ok_or_else(|| ToolError::validation(key, format!("'{key}' must be a boolean"))),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be a boolean"))),
    }
}

pub fn arg_optional_u64(args: &Map<String, Value>, key: &str) -> Result<Option<u64>, ToolError> {
    let invalid = || ToolError::validation(key, format!("'{key}' must be an unsigned integer"));
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u64>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// Optional integer constrained to `min..=max`.
pub fn arg_bounded_u64(
    args: &Map<String, Value>,
    key: &str,
    min: u64,
    max: u64,
) -> Result<Option<u64>, ToolError> {
    match arg_optional_u64(args, key)? {
        Some(value) if value < min || value > max => Err(ToolError::validation(
            key,
            format!("'{key}' must be between {min} and {max}"),
        )),
        other => Ok(other),
    }
}

/// Positive page size, falling back to `default`.
pub fn arg_top(args: &Map<String, Value>, default: u64) -> Result<u64, ToolError> {
    match arg_optional_u64(args, "top")? {
        Some(0) => Err(ToolError::validation("top", "'top' must be a positive integer")),
        Some(top) => Ok(top),
        None => Ok(default),
    }
}

/// Trailing window size in hours, 24 unless given.
pub fn arg_hours(args: &Map<String, Value>) -> Result<u32, ToolError> {
    let hours = arg_bounded_u64(args, "hours", 1, MAX_HOURS)?;
    Ok(hours.map_or(DEFAULT_HOURS, |h| h as u32))
}

pub fn arg_optional_string_array(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, ToolError> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    if let Value::String(joined) = value {
        return Ok(Some(
            joined
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        ));
    }
    let items = value
        .as_array()
        .ok_or_else(|| ToolError::validation(key, format!("'{key}' must be an array of strings")))?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let text = item
            .as_str()
            .ok_or_else(|| ToolError::validation(key, format!("'{key}' items must be strings")))?;
        let normalized = text.trim();
        if !normalized.is_empty() {
            out.push(normalized.to_string());
        }
    }
    Ok(Some(out))
}

pub fn arg_optional_object(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Map<String, Value>>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must be an object"))),
    }
}

pub fn required_object(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Map<String, Value>, ToolError> {
    match arg_optional_object(args, key)? {
        Some(map) if !map.is_empty() => Ok(map),
        Some(_) => Err(ToolError::validation(key, format!("'{key}' must not be empty"))),
        None => Err(ToolError::validation(key, format!("Missing required field '{key}'"))),
    }
}

/// The standard OData options shared by every list tool.
pub fn query_options(
    args: &Map<String, Value>,
    default_top: u64,
) -> Result<QueryOptions, ToolError> {
    Ok(QueryOptions::new()
        .select(arg_optional_string(args, "select")?)
        .filter(arg_optional_string(args, "filter")?)
        .orderby(arg_optional_string(args, "orderby")?)
        .top(Some(arg_top(args, default_top)?))
        .skip(arg_optional_u64(args, "skip")?))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn required_string_rejects_missing_blank_and_wrong_type() {
        let err = required_string(&args(json!({})), "connectorId").unwrap_err();
        assert_eq!(err.message, "Missing required field 'connectorId'");
        assert_eq!(err.field.as_deref(), Some("connectorId"));

        let err = required_string(&args(json!({"connectorId": "  "})), "connectorId").unwrap_err();
        assert_eq!(err.message, "'connectorId' must not be empty");

        let err = required_string(&args(json!({"connectorId": 5})), "connectorId").unwrap_err();
        assert_eq!(err.message, "'connectorId' must be a string");

        assert_eq!(
            required_string(&args(json!({"connectorId": " AS2Out "})), "connectorId").unwrap(),
            "AS2Out"
        );
    }

    #[test]
    fn hours_default_and_bounds() {
        assert_eq!(arg_hours(&args(json!({}))).unwrap(), 24);
        assert_eq!(arg_hours(&args(json!({"hours": 12}))).unwrap(), 12);
        assert!(arg_hours(&args(json!({"hours": 0}))).is_err());
        assert!(arg_hours(&args(json!({"hours": -3}))).is_err());
    }

    #[test]
    fn top_must_be_positive() {
        assert_eq!(arg_top(&args(json!({})), 50).unwrap(), 50);
        assert!(arg_top(&args(json!({"top": 0})), 50).is_err());
        assert_eq!(arg_top(&args(json!({"top": "5"})), 50).unwrap(), 5);
    }

    #[test]
    fn string_arrays_accept_comma_strings() {
        assert_eq!(
            arg_optional_string_array(&args(json!({"f": "Send, Sent"})), "f").unwrap(),
            Some(vec!["Send".to_string(), "Sent".to_string()])
        );
        assert!(arg_optional_string_array(&args(json!({"f": [1]})), "f").is_err());
    }

    #[test]
    fn query_options_use_default_top() {
        let query = query_options(&args(json!({"filter": "Status eq 'Error'"})), 50).unwrap();
        assert_eq!(query.top, Some(50));
        assert_eq!(query.filter.as_deref(), Some("Status eq 'Error'"));
        assert_eq!(query.skip, None);
    }
}
