//! Argument extraction helpers shared by the built-in tools.

use serde_json::{Map, Value};
use taskpilot_core::error::ToolError;

type Args = Map<String, Value>;

pub(crate) fn required_str<'a>(args: &'a Args, key: &str) -> Result<&'a str, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(ToolError::InvalidArguments(
            format!("Missing required parameter: {key}"),
        )),
        Some(other) => Err(ToolError::InvalidArguments(format!(
            "Parameter '{key}' must be a string, got {other}"
        ))),
    }
}

pub(crate) fn optional_str<'a>(args: &'a Args, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A non-negative integer, also accepted as a numeric string.
pub(crate) fn optional_u32(args: &Args, key: &str, default: u32) -> Result<u32, ToolError> {
    let invalid = || ToolError::InvalidArguments(format!("Parameter '{key}' must be a positive integer"));
    match args.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// A list of strings. A single string is accepted as a one-element list.
/// Blank entries are dropped.
pub(crate) fn string_list(args: &Args, key: &str) -> Result<Vec<String>, ToolError> {
    let items = match args.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    ToolError::InvalidArguments(format!("Parameter '{key}' must contain only strings"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::String(s)) => vec![s.clone()],
        None | Some(Value::Null) => {
            return Err(ToolError::InvalidArguments(format!(
                "Missing required parameter: {key}"
            )));
        }
        Some(_) => {
            return Err(ToolError::InvalidArguments(format!(
                "Parameter '{key}' must be an array of strings"
            )));
        }
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
