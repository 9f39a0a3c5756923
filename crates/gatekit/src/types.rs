//! Wire types shared by all Gate backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// HTTP method of a Gate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A single request against the Gate API.
///
/// `path` is relative to the configured endpoint and must start with `/`.
#[derive(Debug, Clone, PartialEq)]
pub struct GateRequest {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the Gate endpoint, e.g. `/applications/demo`.
    pub path: String,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl GateRequest {
    /// Build a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// Build a `POST` request with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Build a `PUT` request with a JSON body.
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Build a `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

impl fmt::Display for GateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Status line and body of a Gate response, uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text (may be empty).
    pub body: String,
}

impl RawResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    ///
    /// An empty body decodes to `Value::Null` so callers can tell an empty
    /// reply apart from a malformed one.
    pub fn json(&self) -> Result<Value> {
        if self.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Decode the body into a typed value.
    pub fn json_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(Error::from)
    }
}

/// Opaque reference to an asynchronous task, as returned by `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRef(String);

impl TaskRef {
    /// Wrap a raw reference such as `/tasks/01HXYZ`.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The raw reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The task id (last path segment of the reference).
    #[must_use]
    pub fn id(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.0)
    }

    /// Path used to poll the task status.
    #[must_use]
    pub fn status_path(&self) -> String {
        format!("/tasks/{}", self.id())
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Body returned by `POST /tasks`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskAccepted {
    /// Reference to poll.
    #[serde(rename = "ref")]
    pub reference: TaskRef,
}

/// Execution status reported for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    /// Finished successfully.
    Succeeded,
    /// Stopped by a failing stage.
    Terminal,
    /// Failed.
    Failed,
    /// Cancelled by a user.
    Canceled,
    /// Stopped before completion.
    Stopped,
    /// Still executing.
    Running,
    /// Accepted but not yet started.
    NotStarted,
    /// Any status this client does not know about.
    Other(String),
}

impl TaskStatus {
    /// Canonical upper-case name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Succeeded => "SUCCEEDED",
            Self::Terminal => "TERMINAL",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Stopped => "STOPPED",
            Self::Running => "RUNNING",
            Self::NotStarted => "NOT_STARTED",
            Self::Other(s) => s,
        }
    }

    /// Whether this status means the task completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "SUCCEEDED" => Self::Succeeded,
            "TERMINAL" => Self::Terminal,
            "FAILED" | "FAILED_CONTINUE" => Self::Failed,
            "CANCELED" | "CANCELLED" => Self::Canceled,
            "STOPPED" => Self::Stopped,
            "RUNNING" => Self::Running,
            "NOT_STARTED" => Self::NotStarted,
            _ => Self::Other(value),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by `GET /tasks/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskState {
    /// Current status.
    pub status: TaskStatus,
    /// Task variables; failures carry an `exception` entry.
    #[serde(default)]
    pub variables: Vec<TaskVariable>,
    /// Pipeline-style execution details, present on newer Gate versions.
    #[serde(default)]
    pub execution: Option<Value>,
}

/// A key/value variable attached to a task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskVariable {
    /// Variable name.
    pub key: String,
    /// Variable value.
    #[serde(default)]
    pub value: Value,
}

impl TaskState {
    /// Best-effort human readable reason for a failed task.
    ///
    /// Looks at the `exception` variable first, then at stage contexts of the
    /// execution.
    #[must_use]
    pub fn failure_reason(&self) -> Option<String> {
        let from_variables = self
            .variables
            .iter()
            .find(|v| v.key == "exception")
            .and_then(|v| exception_message(&v.value));

        from_variables.or_else(|| {
            self.execution
                .as_ref()
                .and_then(|e| e.get("stages"))
                .and_then(Value::as_array)
                .and_then(|stages| {
                    stages.iter().find_map(|stage| {
                        stage
                            .get("context")
                            .and_then(|c| c.get("exception"))
                            .and_then(exception_message)
                    })
                })
        })
    }
}

fn exception_message(exception: &Value) -> Option<String> {
    let details = exception.get("details")?;
    let errors: Vec<&str> = details
        .get("errors")
        .and_then(Value::as_array)
        .map(|errs| errs.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if !errors.is_empty() {
        return Some(errors.join("; "));
    }

    details
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_ref_id() {
        let task = TaskRef::new("/tasks/01HXYZ");
        assert_eq!(task.id(), "01HXYZ");
        assert_eq!(task.status_path(), "/tasks/01HXYZ");

        let bare = TaskRef::new("01ABC");
        assert_eq!(bare.id(), "01ABC");
        assert_eq!(bare.status_path(), "/tasks/01ABC");
    }

    #[test]
    fn test_task_accepted_decoding() {
        let response = RawResponse::new(200, r#"{"ref": "/tasks/abc"}"#);
        let accepted: TaskAccepted = response.json_as().unwrap();
        assert_eq!(accepted.reference.id(), "abc");
    }

    #[test]
    fn test_task_status_parsing() {
        assert_eq!(TaskStatus::from("SUCCEEDED".to_string()), TaskStatus::Succeeded);
        assert_eq!(TaskStatus::from("terminal".to_string()), TaskStatus::Terminal);
        assert_eq!(TaskStatus::from("CANCELLED".to_string()), TaskStatus::Canceled);
        assert_eq!(
            TaskStatus::from("BUFFERED".to_string()),
            TaskStatus::Other("BUFFERED".to_string())
        );
        assert!(TaskStatus::Succeeded.is_success());
        assert!(!TaskStatus::Running.is_success());
    }

    #[test]
    fn test_raw_response_empty_body_is_null() {
        let response = RawResponse::new(200, "  ");
        assert_eq!(response.json().unwrap(), Value::Null);
        assert!(response.is_success());
    }

    #[test]
    fn test_raw_response_malformed_body() {
        let response = RawResponse::new(200, "<html>");
        assert!(response.json().is_err());
    }

    #[test]
    fn test_failure_reason_from_variables() {
        let state: TaskState = serde_json::from_value(json!({
            "status": "TERMINAL",
            "variables": [
                {"key": "application", "value": "demo"},
                {"key": "exception", "value": {"details": {"errors": ["name taken", "bad email"]}}}
            ]
        }))
        .unwrap();

        assert_eq!(state.status, TaskStatus::Terminal);
        assert_eq!(state.failure_reason().unwrap(), "name taken; bad email");
    }

    #[test]
    fn test_failure_reason_from_stages() {
        let state: TaskState = serde_json::from_value(json!({
            "status": "FAILED",
            "execution": {
                "stages": [
                    {"context": {}},
                    {"context": {"exception": {"details": {"error": "front50 unavailable"}}}}
                ]
            }
        }))
        .unwrap();

        assert_eq!(state.failure_reason().unwrap(), "front50 unavailable");
    }

    #[test]
    fn test_failure_reason_absent() {
        let state: TaskState = serde_json::from_value(json!({"status": "CANCELED"})).unwrap();
        assert!(state.failure_reason().is_none());
    }

    #[test]
    fn test_request_display() {
        let request = GateRequest::get("/applications/demo");
        assert_eq!(request.to_string(), "GET /applications/demo");
    }
}
