//! The failure taxonomy for calls to the remote service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-field messages, as returned by the service for a rejected payload. For example
/// `{"new_password": ["This password is too short."]}`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Keys in an error body that carry a general message rather than a field-level one.
const DETAIL_KEYS: &[&str] = &["detail", "message", "error"];

/// The broad kind of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    AuthInvalid,
    NetworkUnreachable,
    NotFound,
    ValidationFailed,
    Unknown,
}

serde_plain::derive_display_from_serialize!(ApiErrorKind);

/// A failed call to the remote service.
///
/// `AuthInvalid` has already been handled by the time a caller sees it: the transport cleared the
/// credentials, invalidated the session and redirected to the login route. Callers should only
/// present it, never react to it again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("The session is no longer valid (HTTP {status})")]
    AuthInvalid { status: u16 },

    #[error("Unable to reach the server: {message}")]
    NetworkUnreachable { message: String },

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("The request was rejected (HTTP {status}): {}", summarize(.fields))]
    ValidationFailed { status: u16, fields: FieldErrors },

    #[error("The request failed{}: {detail}", status_suffix(.status))]
    Unknown { status: Option<u16>, detail: String },
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::AuthInvalid { .. } => ApiErrorKind::AuthInvalid,
            ApiError::NetworkUnreachable { .. } => ApiErrorKind::NetworkUnreachable,
            ApiError::NotFound { .. } => ApiErrorKind::NotFound,
            ApiError::ValidationFailed { .. } => ApiErrorKind::ValidationFailed,
            ApiError::Unknown { .. } => ApiErrorKind::Unknown,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        ApiError::NetworkUnreachable {
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        ApiError::NotFound { path: path.into() }
    }

    pub fn unknown(status: Option<u16>, detail: impl Into<String>) -> Self {
        ApiError::Unknown {
            status,
            detail: detail.into(),
        }
    }

    /// A client-side validation failure for a single field. Nothing was sent to the server.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), vec![message.into()]);
        ApiError::ValidationFailed {
            status: 400,
            fields,
        }
    }

    /// Classifies a non-success response. `path` is the request path, used for `NotFound`.
    pub fn from_response(status: u16, path: &str, body: &str) -> Self {
        match status {
            401 | 403 => ApiError::AuthInvalid { status },
            404 => ApiError::not_found(path),
            400..=499 => {
                let parsed: Option<Value> = serde_json::from_str(body).ok();
                let fields = parsed.as_ref().map(field_errors).unwrap_or_default();
                if fields.is_empty() {
                    ApiError::unknown(Some(status), detail(parsed.as_ref(), body))
                } else {
                    ApiError::ValidationFailed { status, fields }
                }
            }
            _ => {
                let parsed: Option<Value> = serde_json::from_str(body).ok();
                ApiError::unknown(Some(status), detail(parsed.as_ref(), body))
            }
        }
    }

    /// Returns the messages for `field`, if the failure was a field-level validation failure.
    pub fn field(&self, field: &str) -> Option<&[String]> {
        match self {
            ApiError::ValidationFailed { fields, .. } => fields.get(field).map(|v| v.as_slice()),
            _ => None,
        }
    }

    /// The text we show the user.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::AuthInvalid { .. } => {
                "Your session has expired. Please log in again.".to_string()
            }
            ApiError::NetworkUnreachable { .. } => {
                "Cannot connect to server. Is the backend running? Please try again.".to_string()
            }
            ApiError::NotFound { path } => format!(
                "The endpoint '{path}' was not found. Check the backend configuration."
            ),
            ApiError::ValidationFailed { fields, .. } => summarize(fields),
            ApiError::Unknown { detail, .. } => format!("Something went wrong: {detail}"),
        }
    }
}

/// Extracts field-level messages from a REST-framework style error body.
fn field_errors(body: &Value) -> FieldErrors {
    let mut fields = FieldErrors::new();
    let Some(map) = body.as_object() else {
        return fields;
    };
    for (key, value) in map {
        if DETAIL_KEYS.contains(&key.as_str()) {
            continue;
        }
        let messages: Vec<String> = match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => continue,
        };
        if !messages.is_empty() {
            fields.insert(key.clone(), messages);
        }
    }
    fields
}

/// Best-effort extraction of a human readable message from an error body.
fn detail(parsed: Option<&Value>, raw: &str) -> String {
    parsed
        .and_then(|v| {
            DETAIL_KEYS
                .iter()
                .find_map(|key| v.get(key).and_then(|d| d.as_str()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                "no details were provided".to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}

fn summarize(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}
