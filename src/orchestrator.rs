//! Wiring for the campus admin backend.
//!
//! Builds the record store, session store, tool set, agent and auth manager from
//! `Settings`, and hands out shared handles to the HTTP and CLI layers.

use crate::agent::{Agent, ChatModel, Mailer, MockMailer, ToolSet};
use crate::auth::AuthManager;
use crate::config::Settings;
use crate::error::{CampusError, Result};
use crate::openai::OpenAiChatModel;
use crate::session::{SessionStore, SqliteSessionStore};
use crate::store::{RecordStore, SqliteRecordStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Shared components of a running campus admin instance.
pub struct Orchestrator {
    settings: Settings,
    store: Arc<dyn RecordStore>,
    agent: Agent,
    auth: Arc<AuthManager>,
}

impl Orchestrator {
    /// Open the SQLite stores and connect the configured language model.
    #[instrument(skip_all)]
    pub fn new(settings: Settings) -> Result<Self> {
        let db_path = settings.sqlite_path();
        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(&db_path)?);
        let sessions: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(&db_path)?);
        let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(&settings.llm)?);

        info!(
            "Using model {} at {} with database {:?}",
            settings.llm.model, settings.llm.base_url, db_path
        );

        Self::with_components(settings, store, sessions, model, Arc::new(MockMailer::new()))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        store: Arc<dyn RecordStore>,
        sessions: Arc<dyn SessionStore>,
        model: Arc<dyn ChatModel>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self> {
        settings.validate()?;

        let secret = settings.secret_key().ok_or_else(|| {
            CampusError::Config(
                "No token secret configured. Set auth.secret_key or the SECRET_KEY environment variable"
                    .to_string(),
            )
        })?;
        let auth = Arc::new(AuthManager::new(
            store.clone(),
            &secret,
            settings.auth.token_expiry_hours,
        )?);

        let tools = Arc::new(ToolSet::new(store.clone(), mailer, settings.faq.clone()));
        let agent = Agent::new(model, tools, sessions).with_settings(&settings.agent);

        Ok(Self {
            settings,
            store,
            agent,
            auth,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn tools(&self) -> &Arc<ToolSet> {
        self.agent.tools()
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        self.agent.sessions()
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }
}
