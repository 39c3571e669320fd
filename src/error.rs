//! Error types for the campus admin backend.

use thiserror::Error;

/// Library-level error type for campus admin operations.
#[derive(Error, Debug)]
pub enum CampusError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Agent stopped after {rounds} tool rounds without a final answer")]
    RoundLimitExceeded {
        /// Rounds executed before the cutoff.
        rounds: usize,
        /// Best-effort answer persisted for the turn.
        partial: String,
    },

    #[error("Language model error: {0}")]
    UpstreamModel(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl CampusError {
    /// Stable snake_case code for API bodies and tool-error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            CampusError::NotFound(_) => "not_found",
            CampusError::Conflict(_) => "conflict",
            CampusError::Validation(_) => "validation_error",
            CampusError::ToolNotFound(_) => "tool_not_found",
            CampusError::RoundLimitExceeded { .. } => "round_limit_exceeded",
            CampusError::UpstreamModel(_) => "upstream_model_error",
            CampusError::Auth(_) => "auth_error",
            CampusError::Config(_) => "config_error",
            CampusError::Storage(_)
            | CampusError::Io(_)
            | CampusError::Json(_)
            | CampusError::TomlParse(_)
            | CampusError::Http(_)
            | CampusError::Database(_) => "internal_error",
        }
    }

    /// Errors the agent loop feeds back to the model instead of failing the turn.
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            CampusError::NotFound(_)
                | CampusError::Conflict(_)
                | CampusError::Validation(_)
                | CampusError::ToolNotFound(_)
        )
    }
}

/// Result type alias for campus admin operations.
pub type Result<T> = std::result::Result<T, CampusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_errors_are_absorbable() {
        assert!(CampusError::NotFound("x".into()).is_tool_error());
        assert!(CampusError::ToolNotFound("x".into()).is_tool_error());
        assert!(!CampusError::UpstreamModel("x".into()).is_tool_error());
        assert!(!CampusError::RoundLimitExceeded {
            rounds: 3,
            partial: String::new()
        }
        .is_tool_error());
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(CampusError::Conflict("dup".into()).kind(), "conflict");
        assert_eq!(CampusError::Validation("bad".into()).kind(), "validation_error");
    }
}
