//! Error types for the record store, the assistant gateway and configuration.
//!
//! The application edge (`main`) works with `anyhow`; these typed errors are
//! what the library layers return so callers can decide whether to degrade
//! or escalate.

use thiserror::Error;
use tracing::{error, warn};

/// Faults raised by a [`crate::store::RecordStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Record {0} not found")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Record store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Record store API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected record store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "motoboys::store", %message, "validation error");
        StoreError::Validation(message)
    }

    pub fn api(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        error!(target: "motoboys::store", status, %body, "record store API error");
        StoreError::Api { status, body }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "motoboys::store", %message, "cannot decode store response");
        StoreError::Decode(message)
    }

    /// True for faults caused by the caller's input rather than the backend.
    pub fn is_user_error(&self) -> bool {
        matches!(self, StoreError::Validation(_) | StoreError::NotFound(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        error!(target: "motoboys::store", error = ?err, "sqlite error");
        StoreError::Database(err.to_string())
    }
}

/// Faults raised while talking to a completion provider.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("No API key configured for the assistant")]
    MissingApiKey,

    #[error("Assistant request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to the assistant at {0}")]
    Connect(String),

    #[error("Assistant API key rejected (status {0})")]
    Unauthorized(u16),

    #[error("Assistant quota exceeded, try again later")]
    RateLimited,

    #[error("Assistant API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Assistant returned an empty answer")]
    EmptyResponse,

    #[error("Failed to read assistant response: {0}")]
    Decode(String),
}

impl AssistantError {
    /// Map a non-success HTTP status to the matching error.
    pub fn from_status(status: u16, body: String) -> Self {
        let err = match status {
            401 | 403 => AssistantError::Unauthorized(status),
            429 => AssistantError::RateLimited,
            _ => AssistantError::Api { status, body },
        };
        warn!(target: "motoboys::assistant", status, error = %err, "assistant request failed");
        err
    }
}

/// Configuration faults. These stop the affected command instead of degrading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing setting `{0}`")]
    Missing(&'static str),

    #[error("Invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_error_from_status() {
        assert!(matches!(
            AssistantError::from_status(401, String::new()),
            AssistantError::Unauthorized(401)
        ));
        assert!(matches!(
            AssistantError::from_status(403, String::new()),
            AssistantError::Unauthorized(403)
        ));
        assert!(matches!(
            AssistantError::from_status(429, String::new()),
            AssistantError::RateLimited
        ));
        match AssistantError::from_status(500, "boom".to_string()) {
            AssistantError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_store_error_user_errors() {
        assert!(StoreError::NotFound(3).is_user_error());
        assert!(StoreError::Validation("x".into()).is_user_error());
        assert!(!StoreError::Database("locked".into()).is_user_error());
        assert_eq!(StoreError::NotFound(3).to_string(), "Record 3 not found");
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::Invalid {
            key: "store.supabase_url",
            reason: "must start with https://".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid setting `store.supabase_url`: must start with https://"
        );
        assert_eq!(
            ConfigError::Missing("assistant.api_key").to_string(),
            "Missing setting `assistant.api_key`"
        );
    }
}
