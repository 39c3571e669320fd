//! Configuration settings for the campus admin backend.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub faq: FaqSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.campus-admin".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Record and session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database holding students, admins and threads.
    pub sqlite_path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.campus-admin/campus.db".to_string(),
        }
    }
}

/// Admin authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 signing secret. Falls back to the `SECRET_KEY` environment variable.
    pub secret_key: Option<String>,
    /// Lifetime of issued access tokens.
    pub token_expiry_hours: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: None,
            token_expiry_hours: 12,
        }
    }
}

/// Language model endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat model name.
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai/".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 300,
        }
    }
}

impl LlmSettings {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum tool-call rounds per user turn.
    pub max_rounds: usize,
    /// Maximum number of persisted turns replayed to the model.
    pub max_history_turns: usize,
    /// System instructions sent ahead of every conversation.
    pub system_prompt: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            max_history_turns: 40,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are the Campus Admin assistant. You must only perform actions after the admin asks for them.

You can call the provided tools to manage students, run analytics, answer campus FAQ questions and send notifications.

Guidelines:
- Use 'get_student' before updating or deleting if you are unsure a student exists
- Use 'get_students_by_department' with a department name to count students in one department
- Use 'list_students' only when the admin needs the full roster
- If a tool returns an error, explain it to the admin or correct your arguments and retry

Answer concisely and include the numbers or records the tools returned."#;

/// A scheduled campus event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampusEvent {
    pub title: String,
    pub date: String,
}

/// Static campus FAQ answers served by the FAQ tools and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaqSettings {
    pub cafeteria_timings: String,
    pub library_hours: String,
    pub events: Vec<CampusEvent>,
}

impl Default for FaqSettings {
    fn default() -> Self {
        Self {
            cafeteria_timings: "Mon-Fri 8am-8pm, Sat-Sun 9am-5pm".to_string(),
            library_hours: "Mon-Fri 9am-10pm, Sat 9am-6pm, Sun Closed".to_string(),
            events: vec![
                CampusEvent {
                    title: "Orientation".to_string(),
                    date: "Sept 25".to_string(),
                },
                CampusEvent {
                    title: "Tech Talk".to_string(),
                    date: "Oct 5".to_string(),
                },
                CampusEvent {
                    title: "Sports Day".to_string(),
                    date: "Oct 15".to_string(),
                },
            ],
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the agent and auth layers cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::CampusError;

        if self.agent.max_rounds == 0 {
            return Err(CampusError::Config("agent.max_rounds must be at least 1".to_string()));
        }
        if self.agent.max_history_turns == 0 {
            return Err(CampusError::Config(
                "agent.max_history_turns must be at least 1".to_string(),
            ));
        }
        if self.auth.token_expiry_hours == 0 {
            return Err(CampusError::Config(
                "auth.token_expiry_hours must be at least 1".to_string(),
            ));
        }
        url::Url::parse(&self.llm.base_url)
            .map_err(|e| CampusError::Config(format!("llm.base_url is invalid: {}", e)))?;
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CampusError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("campus-admin")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.database.sqlite_path)
    }

    /// Token signing secret from config, then the `SECRET_KEY` environment variable.
    pub fn secret_key(&self) -> Option<String> {
        self.auth
            .secret_key
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| std::env::var("SECRET_KEY").ok().filter(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.agent.max_rounds, 8);
        assert_eq!(settings.faq.events.len(), 3);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [agent]
            max_rounds = 3

            [server]
            port = 9090
            "#,
        )
        .unwrap();

        assert_eq!(settings.agent.max_rounds, 3);
        assert_eq!(settings.agent.max_history_turns, 40);
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let mut settings = Settings::default();
        settings.agent.max_rounds = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let mut settings = Settings::default();
        settings.llm.base_url = "not a url".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_configured_secret_wins() {
        let mut settings = Settings::default();
        settings.auth.secret_key = Some("from-config".to_string());
        assert_eq!(settings.secret_key().as_deref(), Some("from-config"));
    }
}
