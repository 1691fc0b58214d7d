//! SQLite session backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::SessionBackend;
use crate::types::{InteractionRecord, PhaseResult, Session};

const SESSION_COLUMNS: &str = "session_key, project_path, branch, current_phase, plan_file_path, \
     workflow_name, require_reviews, revision, created_at, updated_at";

/// Sessions and interactions in one SQLite database
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the database at `db_path`
    pub fn open(db_path: &Path) -> PhaseResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        // other server processes may share the file
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> PhaseResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> PhaseResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            session_key TEXT PRIMARY KEY,
            project_path TEXT NOT NULL,
            branch TEXT NOT NULL,
            current_phase TEXT NOT NULL,
            plan_file_path TEXT NOT NULL,
            workflow_name TEXT NOT NULL,
            require_reviews INTEGER NOT NULL DEFAULT 0,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS interactions (
            id TEXT PRIMARY KEY,
            session_key TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            input TEXT NOT NULL,
            response TEXT NOT NULL,
            phase TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_interactions_session
        ON interactions(session_key, created_at);
        "#,
    )
}

fn parse_time(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn session_from_row(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        session_key: row.get(0)?,
        project_path: row.get(1)?,
        branch: row.get(2)?,
        current_phase: row.get(3)?,
        plan_file_path: row.get(4)?,
        workflow_name: row.get(5)?,
        require_reviews: row.get(6)?,
        revision: row.get::<_, i64>(7)? as u64,
        created_at: parse_time(row, 8)?,
        updated_at: parse_time(row, 9)?,
    })
}

#[async_trait]
impl SessionBackend for SqliteBackend {
    async fn load(&self, key: &str) -> PhaseResult<Option<Session>> {
        let conn = self.conn.lock().await;
        let session = conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE session_key = ?1", SESSION_COLUMNS),
                params![key],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    async fn insert(&self, session: &Session) -> PhaseResult<bool> {
        let conn = self.conn.lock().await;
        let inserted = conn.execute(
            &format!(
                "INSERT OR IGNORE INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                SESSION_COLUMNS
            ),
            params![
                &session.session_key,
                &session.project_path,
                &session.branch,
                &session.current_phase,
                &session.plan_file_path,
                &session.workflow_name,
                session.require_reviews,
                session.revision as i64,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted == 1)
    }

    async fn compare_and_swap(&self, expected_revision: u64, session: &Session) -> PhaseResult<bool> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            r#"
            UPDATE sessions
            SET project_path = ?2, branch = ?3, current_phase = ?4, plan_file_path = ?5,
                workflow_name = ?6, require_reviews = ?7, revision = ?8, updated_at = ?9
            WHERE session_key = ?1 AND revision = ?10
            "#,
            params![
                &session.session_key,
                &session.project_path,
                &session.branch,
                &session.current_phase,
                &session.plan_file_path,
                &session.workflow_name,
                session.require_reviews,
                session.revision as i64,
                session.updated_at.to_rfc3339(),
                expected_revision as i64,
            ],
        )?;
        Ok(changed == 1)
    }

    async fn remove(&self, key: &str) -> PhaseResult<bool> {
        let conn = self.conn.lock().await;
        let removed = conn.execute("DELETE FROM sessions WHERE session_key = ?1", params![key])?;
        Ok(removed > 0)
    }

    async fn append_interaction(&self, record: &InteractionRecord) -> PhaseResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO interactions (id, session_key, tool_name, input, response, phase, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                &record.id,
                &record.session_key,
                &record.tool_name,
                &record.input,
                &record.response,
                &record.phase,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn interactions(&self, key: &str) -> PhaseResult<Vec<InteractionRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, session_key, tool_name, input, response, phase, created_at
            FROM interactions
            WHERE session_key = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;
        let records = stmt
            .query_map(params![key], |row| {
                Ok(InteractionRecord {
                    id: row.get(0)?,
                    session_key: row.get(1)?,
                    tool_name: row.get(2)?,
                    input: row.get(3)?,
                    response: row.get(4)?,
                    phase: row.get(5)?,
                    created_at: parse_time(row, 6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn remove_interactions(&self, key: &str) -> PhaseResult<usize> {
        let conn = self.conn.lock().await;
        let removed = conn.execute("DELETE FROM interactions WHERE session_key = ?1", params![key])?;
        Ok(removed)
    }
}
