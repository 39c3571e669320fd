//! Pre-flight checks before starting the agent or server.
//!
//! Validates that required credentials are available before starting operations that
//! would otherwise fail on the first request.

use crate::config::Settings;
use crate::error::{CampusError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Talking to the agent requires a model API key.
    Chat,
    /// Serving requires a model API key and a token secret.
    Serve,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    check_api_key(settings)?;
    if let Operation::Serve = operation {
        check_secret_key(settings)?;
    }
    Ok(())
}

/// Check that the model API key is set.
fn check_api_key(settings: &Settings) -> Result<()> {
    let var = &settings.llm.api_key_env;
    match settings.llm.api_key() {
        Some(_) => Ok(()),
        None => Err(CampusError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            var, var
        ))),
    }
}

/// Check that a token signing secret is available.
fn check_secret_key(settings: &Settings) -> Result<()> {
    match settings.secret_key() {
        Some(_) => Ok(()),
        None => Err(CampusError::Config(
            "No token secret. Set auth.secret_key or export SECRET_KEY='...'".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_reported() {
        let mut settings = Settings::default();
        settings.llm.api_key_env = "CAMPUS_ADMIN_TEST_UNSET_KEY".to_string();
        let err = check(Operation::Chat, &settings).unwrap_err();
        assert!(err.to_string().contains("CAMPUS_ADMIN_TEST_UNSET_KEY"));
    }
}
