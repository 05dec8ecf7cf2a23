//! # Error Taxonomy
//!
//! Every fallible operation in the crate returns [`ActorError`]. The variants split into
//! four families that callers care about:
//!
//! | Family | Variant(s) | Wire status |
//! |--------|------------|-------------|
//! | Not found | [`ActorError::NotFound`] | 500 |
//! | Business failure | [`ActorError::Serializable`] | the error's own `statusCode` |
//! | Activation failure | [`ActorError::DependencyResolution`] | 500 |
//! | Anything else | the remaining variants | 500 |
//!
//! Only [`SerializableError`] ever reaches the wire with a body. Everything else is
//! reported as a bare 500 so no internal detail leaks to the caller.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ActorError>;

/// Status returned for every error that is not a [`SerializableError`].
pub const INTERNAL_ERROR_STATUS: u16 = 500;

/// Default status of a [`SerializableError`] built without an explicit code.
pub const BAD_REQUEST_STATUS: u16 = 400;

#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Serializable(#[from] SerializableError),

    #[error("Failed to resolve dependency {service} for actor {actor_type}")]
    DependencyResolution { actor_type: String, service: String },

    #[error("Actor {actor_type} has no method {method}")]
    UnknownMethod { actor_type: String, method: String },

    #[error("Invalid argument {index} for {method}: {reason}")]
    InvalidArgument {
        method: String,
        index: usize,
        reason: String,
    },

    #[error("State store error for key {key}: {reason}")]
    State { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid activation transition for {actor_id}: {from} -> {to}")]
    InvalidTransition {
        actor_id: String,
        from: String,
        to: String,
    },

    #[error("Reentrancy depth {depth} exceeds maximum {max} for {actor_id}")]
    ReentrancyDepthExceeded {
        actor_id: String,
        depth: usize,
        max: usize,
    },

    #[error("No call scope is active")]
    NoActiveScope,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote invocation failed with status {status}")]
    Remote { status: u16 },

    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl ActorError {
    /// Status code this error maps to at the transport boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            ActorError::Serializable(e) => e.status_code,
            _ => INTERNAL_ERROR_STATUS,
        }
    }

    /// Body sent to the caller. Only serializable errors produce one.
    pub fn response_body(&self) -> Value {
        match self {
            ActorError::Serializable(e) => e.to_value(),
            _ => Value::Null,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ActorError::NotFound(_))
    }
}

/// An expected business failure that is safe to send to the caller.
///
/// The JSON shape is exactly `{name, message, statusCode}` so any peer that speaks the
/// same wire convention can reconstruct it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "camelCase")]
#[error("{name}: {message} (status {status_code})")]
pub struct SerializableError {
    pub name: String,
    pub message: String,
    pub status_code: u16,
}

impl SerializableError {
    pub const NAME: &'static str = "SerializableError";

    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            name: Self::NAME.to_string(),
            message: message.into(),
            status_code,
        }
    }

    /// A serializable error carrying the default 400 status.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, BAD_REQUEST_STATUS)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "message": self.message,
            "statusCode": self.status_code,
        })
    }

    /// Reconstructs an error from a response body if it carries the expected shape.
    pub fn from_value(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        if !object.contains_key("message") || !object.contains_key("statusCode") {
            return None;
        }
        serde_json::from_value(body.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializable_error_body_has_exactly_three_fields() {
        let err = ActorError::from(SerializableError::bad_request("bad request"));
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.response_body(),
            json!({"name": "SerializableError", "message": "bad request", "statusCode": 400})
        );
    }

    #[test]
    fn other_errors_map_to_500_without_body() {
        let err = ActorError::Unexpected("database password is hunter2".into());
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.response_body(), Value::Null);

        let err = ActorError::NotFound("CounterActor".into());
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn from_value_requires_message_and_status() {
        assert!(SerializableError::from_value(&json!({"message": "x"})).is_none());
        assert!(SerializableError::from_value(&json!(null)).is_none());
        let parsed = SerializableError::from_value(
            &json!({"name": "Conflict", "message": "taken", "statusCode": 409}),
        )
        .unwrap();
        assert_eq!(parsed.status_code, 409);
        assert_eq!(parsed.name, "Conflict");
    }
}
