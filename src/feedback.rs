use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};

use crate::error::MonitorError;

/// Per-URL status tags kept outside the pipeline (liked, hidden, bought, ...).
pub trait FeedbackSource: Send + Sync {
    fn load(&self) -> Result<HashMap<String, String>, MonitorError>;
}

pub struct NoFeedback;

impl FeedbackSource for NoFeedback {
    fn load(&self) -> Result<HashMap<String, String>, MonitorError> {
        Ok(HashMap::new())
    }
}

/// Feedback kept in a SQLite file. A missing file reads as no feedback.
pub struct SqliteFeedback {
    path: PathBuf,
}

impl SqliteFeedback {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteFeedback { path: path.into() }
    }
}

impl FeedbackSource for SqliteFeedback {
    fn load(&self) -> Result<HashMap<String, String>, MonitorError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let has_table: bool = conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'feedback')",
            [],
            |row| row.get(0),
        )?;
        if !has_table {
            return Ok(HashMap::new());
        }
        let mut stmt = conn.prepare("SELECT url, status FROM feedback WHERE status IS NOT NULL")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }
}

pub fn connect(path: &Path) -> Result<Connection, MonitorError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MonitorError::write(parent, e))?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), MonitorError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS feedback (
            url        TEXT PRIMARY KEY,
            status     TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

/// Tag `url` with `status`, or clear its tag when `status` is `None`.
pub fn set_status(conn: &Connection, url: &str, status: Option<&str>) -> Result<(), MonitorError> {
    conn.execute(
        "INSERT OR REPLACE INTO feedback (url, status, updated_at) VALUES (?1, ?2, datetime('now'))",
        rusqlite::params![url, status],
    )?;
    Ok(())
}
