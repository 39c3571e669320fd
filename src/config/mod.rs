//! Configuration module.
//!
//! Handles loading and validating application settings.

mod settings;

pub use settings::{
    AgentSettings, AuthSettings, CampusEvent, DatabaseSettings, FaqSettings, GeneralSettings,
    LlmSettings, ServerSettings, Settings,
};
