//! Argument parsing helpers shared by the tools

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::{DatabricksMcpError, Result};

/// Deserialize tool arguments; a missing/null payload counts as `{}`
pub(crate) fn parse<T: DeserializeOwned>(input: Value) -> Result<T> {
    let input = match input {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(input).map_err(|e| DatabricksMcpError::InvalidInput(e.to_string()))
}

/// Reject blank strings for fields that must name something
pub(crate) fn non_empty<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DatabricksMcpError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(trimmed)
}

/// `{"type": "object", "properties": ..., "required": [...]}`
pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Args {
        name: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    struct NoArgs {}

    #[test]
    fn test_parse_ok() {
        let args: Args = parse(json!({ "name": "x", "limit": 3 })).unwrap();
        assert_eq!(args.name, "x");
        assert_eq!(args.limit, Some(3));
    }

    #[test]
    fn test_parse_missing_field() {
        let err = parse::<Args>(json!({})).unwrap_err();
        assert!(matches!(err, DatabricksMcpError::InvalidInput(_)));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_parse_wrong_type() {
        let err = parse::<Args>(json!({ "name": "x", "limit": "ten" })).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_null_is_empty_object() {
        assert!(parse::<NoArgs>(Value::Null).is_ok());
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("path", " /a ").unwrap(), "/a");
        assert!(non_empty("path", "  ").is_err());
    }
}
