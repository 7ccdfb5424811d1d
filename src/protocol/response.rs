//! Outbound responses
//!
//! A response is either `{"error": "..."}` or a typed result payload such as
//! `{"type": "execute_result", ...}`. Hosts tell them apart by the presence of
//! the `error` key.

use serde::Serialize;
use serde_json::Value;

/// Emitted in place of a response that could not be encoded
pub const SERIALIZATION_FAILED: &str = r#"{"error": "Serialization failed"}"#;

/// Response to exactly one request line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Result(ResultPayload),
    Error { error: String },
}

/// Successful result payloads, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultPayload {
    ExecuteResult(ExecuteResult),
}

/// Outcome of a process that started and exited
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    /// Correlation token from the request, `null` if none was sent
    pub token: Value,
    /// Exit status; negative signal number if the child was killed by a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl Response {
    /// Build an error response
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            error: message.into(),
        }
    }

    /// Wrap an execute result
    pub fn execute_result(result: ExecuteResult) -> Self {
        Response::Result(ResultPayload::ExecuteResult(result))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Encode as compact single-line JSON.
    ///
    /// Never fails: an unencodable payload becomes [`SERIALIZATION_FAILED`].
    /// serde_json escapes control characters inside strings, so the result
    /// never contains a raw newline.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                SERIALIZATION_FAILED.to_string()
            }
        }
    }
}
