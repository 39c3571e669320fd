//! SQLite-backed session store.
//!
//! Turns live in a single append-only table; `seq` is assigned inside the insert so the
//! per-thread order survives concurrent appends.

use super::{check_thread_id, Role, SessionStore, ToolCallRecord, Turn};
use crate::error::{CampusError, Result};
use crate::store::{format_ts, parse_ts};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS turns (
    thread_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    tool_call_json TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (thread_id, seq)
);
"#;

/// SQLite-backed session store.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open (or create) the session tables at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite session store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory session store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CampusError::Storage(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self))]
    async fn load(&self, thread_id: &str) -> Result<Vec<Turn>> {
        let thread_id = check_thread_id(thread_id)?;
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT role, content, tool_call_json, created_at
            FROM turns
            WHERE thread_id = ?1
            ORDER BY seq ASC
            "#,
        )?;

        let rows = stmt.query_map(params![thread_id], |row| {
            let role: String = row.get(0)?;
            let content: String = row.get(1)?;
            let tool_call_json: Option<String> = row.get(2)?;
            let created_at: String = row.get(3)?;
            Ok((role, content, tool_call_json, created_at))
        })?;

        let mut turns = Vec::new();
        for row in rows {
            let (role, content, tool_call_json, created_at) = row?;
            let tool_call = match tool_call_json {
                Some(json) => Some(serde_json::from_str::<ToolCallRecord>(&json)?),
                None => None,
            };
            turns.push(Turn {
                role: role.parse::<Role>()?,
                content,
                tool_call,
                created_at: parse_ts(&created_at),
            });
        }

        debug!("Loaded {} turns for thread {}", turns.len(), thread_id);
        Ok(turns)
    }

    async fn append(&self, thread_id: &str, turn: &Turn) -> Result<()> {
        let thread_id = check_thread_id(thread_id)?;
        let tool_call_json = turn
            .tool_call
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO turns (thread_id, seq, role, content, tool_call_json, created_at)
            VALUES (
                ?1,
                (SELECT COALESCE(MAX(seq), -1) + 1 FROM turns WHERE thread_id = ?1),
                ?2, ?3, ?4, ?5
            )
            "#,
            params![
                thread_id,
                turn.role.as_str(),
                turn.content,
                tool_call_json,
                format_ts(&turn.created_at),
            ],
        )?;
        Ok(())
    }

    async fn list_threads(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT thread_id, MAX(created_at) AS last_at
            FROM turns
            GROUP BY thread_id
            ORDER BY last_at DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let ids = rows.collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}
