//! Inbound request parsing
//!
//! Each non-empty line from the host is one JSON object. Parsing happens in
//! two steps so that the error reported back matches the failure:
//! first the line must be JSON at all, then its `type` selects the request
//! shape and the type-specific fields are decoded.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Request type for running a command to completion
pub const TYPE_EXECUTE: &str = "execute";

/// A validated request from the host
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Run a command and report its exit code and output
    Execute(ExecuteRequest),
}

impl Request {
    /// Wire name of this request's `type`
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Execute(_) => TYPE_EXECUTE,
        }
    }
}

/// Payload of an `execute` request
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExecuteRequest {
    /// Program followed by its arguments. A bare string is a program with no arguments.
    #[serde(default, deserialize_with = "command_line")]
    pub cmd: Vec<String>,
    /// Working directory for the child; must already exist
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Overrides applied on top of the agent's own environment
    #[serde(default, deserialize_with = "null_as_empty")]
    pub env: HashMap<String, String>,
    /// Opaque correlation value, echoed back unchanged
    #[serde(default)]
    pub token: Value,
    /// Kill the child if it runs longer than this
    #[serde(default, rename = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandLine {
    Program(String),
    Argv(Vec<String>),
}

fn command_line<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<CommandLine>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(CommandLine::Program(program)) if program.is_empty() => Vec::new(),
        Some(CommandLine::Program(program)) => vec![program],
        Some(CommandLine::Argv(argv)) => argv,
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Framing and protocol errors. All of them are answered with an error
/// response; none of them stop the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// The line is not JSON. Carries the line as received.
    InvalidJson(String),
    /// Valid JSON, but not an object
    NotAnObject,
    /// `type` is missing or not one the agent handles
    UnknownType(String),
    /// `type` is known but its fields don't decode
    InvalidField(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::InvalidJson(line) => write!(f, "Invalid JSON: {}", line),
            ProtocolError::NotAnObject => write!(f, "Invalid request: expected a JSON object"),
            ProtocolError::UnknownType(kind) => write!(f, "Unknown type: {}", kind),
            ProtocolError::InvalidField(msg) => write!(f, "Invalid execute request: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Parse one trimmed, non-empty line into a request
pub fn parse_request(line: &str) -> Result<Request, ProtocolError> {
    let value: Value =
        serde_json::from_str(line).map_err(|_| ProtocolError::InvalidJson(line.to_string()))?;

    let kind = match &value {
        Value::Object(fields) => fields.get("type").cloned().unwrap_or(Value::Null),
        _ => return Err(ProtocolError::NotAnObject),
    };

    match kind.as_str() {
        Some(TYPE_EXECUTE) => serde_json::from_value(value)
            .map(Request::Execute)
            .map_err(|e| ProtocolError::InvalidField(e.to_string())),
        Some(other) => Err(ProtocolError::UnknownType(other.to_string())),
        // Non-string types are reported as their JSON text (`null`, `42`, ...)
        None => Err(ProtocolError::UnknownType(kind.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn execute(line: &str) -> ExecuteRequest {
        match parse_request(line).unwrap() {
            Request::Execute(req) => req,
        }
    }

    #[test]
    fn test_parse_full_execute_request() {
        let req = execute(
            r#"{"type":"execute","cmd":["ls","-la"],"cwd":"/tmp","env":{"A":"1"},"token":"abc","timeoutMs":500}"#,
        );
        assert_eq!(req.cmd, vec!["ls", "-la"]);
        assert_eq!(req.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(req.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(req.token, json!("abc"));
        assert_eq!(req.timeout_ms, Some(500));
    }

    #[test]
    fn test_optional_fields_default() {
        let req = execute(r#"{"type":"execute","cmd":["true"]}"#);
        assert!(req.cwd.is_none());
        assert!(req.env.is_empty());
        assert!(req.token.is_null());
        assert!(req.timeout_ms.is_none());
    }

    #[test]
    fn test_nulls_are_treated_as_absent() {
        let req = execute(r#"{"type":"execute","cmd":["true"],"cwd":null,"env":null,"token":null}"#);
        assert!(req.cwd.is_none());
        assert!(req.env.is_empty());
        assert!(req.token.is_null());
    }

    #[test]
    fn test_command_forms() {
        assert_eq!(execute(r#"{"type":"execute","cmd":"uname"}"#).cmd, vec!["uname"]);
        assert!(execute(r#"{"type":"execute","cmd":""}"#).cmd.is_empty());
        assert!(execute(r#"{"type":"execute","cmd":[]}"#).cmd.is_empty());
        assert!(execute(r#"{"type":"execute","cmd":null}"#).cmd.is_empty());
        assert!(execute(r#"{"type":"execute"}"#).cmd.is_empty());
    }

    #[test]
    fn test_token_is_opaque() {
        let req = execute(r#"{"type":"execute","cmd":["true"],"token":{"id":7,"tags":["x"]}}"#);
        assert_eq!(req.token, json!({"id": 7, "tags": ["x"]}));
    }

    #[test]
    fn test_invalid_json_keeps_original_line() {
        let err = parse_request("{not json").unwrap_err();
        assert_eq!(err, ProtocolError::InvalidJson("{not json".to_string()));
        assert_eq!(err.to_string(), "Invalid JSON: {not json");
    }

    #[test]
    fn test_unknown_type() {
        let err = parse_request(r#"{"type":"spawn","cmd":["ls"]}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unknown type: spawn");
    }

    #[test]
    fn test_missing_type_is_unknown() {
        let err = parse_request(r#"{"cmd":["ls"]}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unknown type: null");

        let err = parse_request(r#"{"type":3}"#).unwrap_err();
        assert_eq!(err.to_string(), "Unknown type: 3");
    }

    #[test]
    fn test_non_object_json() {
        assert_eq!(parse_request("[1,2]").unwrap_err(), ProtocolError::NotAnObject);
        assert_eq!(parse_request("\"execute\"").unwrap_err(), ProtocolError::NotAnObject);
    }

    #[test]
    fn test_bad_field_types() {
        let err = parse_request(r#"{"type":"execute","cmd":[1,2]}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField(_)));
        assert!(err.to_string().starts_with("Invalid execute request: "));

        let err = parse_request(r#"{"type":"execute","cmd":["env"],"env":{"A":1}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField(_)));
    }
}
