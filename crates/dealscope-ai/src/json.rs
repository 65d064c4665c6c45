//! Recovery of a JSON object from model output.

use serde_json::Value;

use crate::error::ServiceError;

/// Parse model output as a JSON object.
///
/// Tolerates a surrounding markdown fence and leading/trailing prose; anything
/// that is not ultimately an object is rejected.
pub fn parse_json_object(raw: &str) -> Result<Value, ServiceError> {
    let trimmed = strip_fence(raw.trim());
    if trimmed.is_empty() {
        return Err(ServiceError::EmptyResponse);
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(v) => v,
        Err(first) => {
            let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
                return Err(ServiceError::MalformedResponse(first.to_string()));
            };
            if end <= start {
                return Err(ServiceError::MalformedResponse(first.to_string()));
            }
            serde_json::from_str(&trimmed[start..=end])
                .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?
        }
    };

    if value.is_object() {
        Ok(value)
    } else {
        Err(ServiceError::MalformedResponse(format!(
            "expected an object, got {}",
            kind(&value)
        )))
    }
}

fn strip_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // Drop the info string (`json`) on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object() {
        let v = parse_json_object(r#"{"a": 1}"#).unwrap();
        assert_eq!(v["a"], 1);
    }

    #[test]
    fn fenced_object() {
        let v = parse_json_object("```json\n{\"flag\": \"GREEN\"}\n```").unwrap();
        assert_eq!(v["flag"], "GREEN");
    }

    #[test]
    fn object_wrapped_in_prose() {
        let v = parse_json_object("Here is the analysis:\n{\"ok\": true}\nThanks.").unwrap();
        assert_eq!(v["ok"], true);
    }

    #[test]
    fn arrays_are_rejected() {
        let err = parse_json_object("[1, 2]").unwrap_err();
        assert!(matches!(err, ServiceError::MalformedResponse(_)));
    }

    #[test]
    fn empty_and_garbage() {
        assert!(matches!(parse_json_object("  "), Err(ServiceError::EmptyResponse)));
        assert!(matches!(
            parse_json_object("not json at all"),
            Err(ServiceError::MalformedResponse(_))
        ));
    }
}
