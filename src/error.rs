use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::http_client::SimpleHttpResponse;

/// Normalized error handed to every caller of the client.
///
/// Whatever went wrong (a rejected login, a 422 from a form submit, a dropped
/// connection) collaborators see the same `{message, status, data}` shape.
#[derive(Error, Debug, Clone, Serialize)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Error category for programmatic handling
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// HTTP status, when a response was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Response payload, when the backend sent one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Type alias for client results
pub type ApiResult<T> = Result<T, ApiError>;

/// Enumeration of error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid credentials, failed refresh, or a 401 that survived a retry
    Auth,
    /// 400/422 field errors from the backend, or rejected input
    Validation,
    /// No response was received
    Network,
    /// 404
    NotFound,
    /// Any other non-success status
    Http,
    /// A success response whose body did not have the expected shape
    Decode,
    /// The session store could not be read or written
    Storage,
    /// Invalid client configuration
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code_str = match self {
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Http => "HTTP_ERROR",
            ErrorKind::Decode => "DECODE_ERROR",
            ErrorKind::Storage => "STORAGE_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            data: None,
        }
    }

    /// Attach an HTTP status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the response payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A transport failure; no status is attached since nothing came back
    pub fn network(error: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Network, format!("Network error: {}", error))
    }

    pub fn decode(error: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Decode, format!("Unexpected response body: {}", error))
    }

    pub fn storage(error: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Storage, format!("Session storage failed: {}", error))
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Normalize a non-success response
    pub fn from_response(response: &SimpleHttpResponse) -> Self {
        let status = response.status().as_u16();
        let data = parse_body(response.body());

        let message = data
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| format!("Request failed with status code {}", status));

        let kind = match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Auth,
            404 => ErrorKind::NotFound,
            _ => ErrorKind::Http,
        };

        let mut error = Self::new(kind, message).with_status(status);
        error.data = data;
        error
    }

    pub fn is_auth(&self) -> bool {
        self.kind == ErrorKind::Auth
    }

    pub fn is_network(&self) -> bool {
        self.kind == ErrorKind::Network
    }

    /// Per-field messages from a validation payload, keyed by field name.
    ///
    /// DRF sends `{"field": ["msg", ...]}` or `{"field": "msg"}`; anything
    /// else is ignored.
    pub fn field_errors(&self) -> HashMap<String, Vec<String>> {
        let mut fields = HashMap::new();
        if self.kind != ErrorKind::Validation {
            return fields;
        }

        if let Some(Value::Object(map)) = &self.data {
            for (field, value) in map {
                let messages = string_list(value);
                if !messages.is_empty() {
                    fields.insert(field.clone(), messages);
                }
            }
        }
        fields
    }
}

fn parse_body(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string())))
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Pick the most useful human message out of a DRF error payload
pub(crate) fn extract_message(data: &Value) -> Option<String> {
    let map = data.as_object()?;

    for key in ["detail", "error", "message"] {
        if let Some(text) = map.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }

    if let Some(first) = map.get("non_field_errors").map(string_list).and_then(|l| l.into_iter().next()) {
        return Some(first);
    }

    map.iter().find_map(|(field, value)| {
        string_list(value)
            .into_iter()
            .next()
            .map(|msg| format!("{}: {}", field, msg))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use serde_json::json;

    fn response(status: u16, body: &str) -> SimpleHttpResponse {
        SimpleHttpResponse::new(StatusCode::from_u16(status).unwrap(), body)
    }

    #[test]
    fn test_classifies_by_status() {
        assert_eq!(ApiError::from_response(&response(400, "{}")).kind, ErrorKind::Validation);
        assert_eq!(ApiError::from_response(&response(422, "{}")).kind, ErrorKind::Validation);
        assert_eq!(ApiError::from_response(&response(401, "{}")).kind, ErrorKind::Auth);
        assert_eq!(ApiError::from_response(&response(404, "")).kind, ErrorKind::NotFound);
        assert_eq!(ApiError::from_response(&response(500, "")).kind, ErrorKind::Http);
        assert_eq!(ApiError::from_response(&response(403, "")).kind, ErrorKind::Http);
    }

    #[test]
    fn test_message_prefers_detail() {
        let err = ApiError::from_response(&response(
            404,
            r#"{"detail": "Not found.", "error": "ignored"}"#,
        ));
        assert_eq!(err.message, "Not found.");
        assert_eq!(err.status, Some(404));
        assert_eq!(err.data.unwrap()["detail"], "Not found.");
    }

    #[test]
    fn test_message_falls_back_to_fields_then_status() {
        let err = ApiError::from_response(&response(
            400,
            r#"{"non_field_errors": ["Invalid email/username or password."]}"#,
        ));
        assert_eq!(err.message, "Invalid email/username or password.");

        let err = ApiError::from_response(&response(400, r#"{"name": ["This field is required."]}"#));
        assert_eq!(err.message, "name: This field is required.");

        let err = ApiError::from_response(&response(502, "<html>bad gateway</html>"));
        assert_eq!(err.message, "Request failed with status code 502");
        assert_eq!(err.data, Some(json!("<html>bad gateway</html>")));
    }

    #[test]
    fn test_field_errors_only_for_validation() {
        let err = ApiError::from_response(&response(
            400,
            r#"{"email": ["Enter a valid email address."], "budget": "Must be positive.", "count": 3}"#,
        ));
        let fields = err.field_errors();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["email"], vec!["Enter a valid email address."]);
        assert_eq!(fields["budget"], vec!["Must be positive."]);

        let err = ApiError::from_response(&response(500, r#"{"email": ["x"]}"#));
        assert!(err.field_errors().is_empty());
    }

    #[test]
    fn test_network_error_has_no_status() {
        let err = ApiError::network("connection refused");
        assert!(err.is_network());
        assert_eq!(err.status, None);
        assert_eq!(err.to_string(), "NETWORK_ERROR: Network error: connection refused");
    }
}
