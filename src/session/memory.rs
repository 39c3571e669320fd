//! In-memory session store.

use super::{check_thread_id, SessionStore, Turn};
use crate::error::{CampusError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory session store; history is lost on restart.
#[derive(Default)]
pub struct MemorySessionStore {
    threads: RwLock<HashMap<String, Vec<Turn>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, thread_id: &str) -> Result<Vec<Turn>> {
        let thread_id = check_thread_id(thread_id)?;
        let threads = self
            .threads
            .read()
            .map_err(|e| CampusError::Storage(format!("Failed to acquire lock: {}", e)))?;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }

    async fn append(&self, thread_id: &str, turn: &Turn) -> Result<()> {
        let thread_id = check_thread_id(thread_id)?;
        let mut threads = self
            .threads
            .write()
            .map_err(|e| CampusError::Storage(format!("Failed to acquire lock: {}", e)))?;
        threads
            .entry(thread_id.to_string())
            .or_default()
            .push(turn.clone());
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let threads = self
            .threads
            .read()
            .map_err(|e| CampusError::Storage(format!("Failed to acquire lock: {}", e)))?;

        let mut ids: Vec<(String, chrono::DateTime<chrono::Utc>)> = threads
            .iter()
            .filter_map(|(id, turns)| turns.last().map(|t| (id.clone(), t.created_at)))
            .collect();
        ids.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(ids.into_iter().map(|(id, _)| id).collect())
    }
}
