use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::core::Job;

const SELECT_COLUMNS: &str =
    "SELECT id, request_json, status_json, images_json, created_at, updated_at, parent_id FROM jobs";

/// Generation history store
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Get the database file path
    pub fn db_path() -> Result<PathBuf> {
        let proj_dirs = Config::project_dirs()?;
        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;
        Ok(data_dir.join("history.db"))
    }

    /// Open or create the database at the default location
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::db_path()?)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                request_json TEXT NOT NULL,
                status_json TEXT NOT NULL,
                images_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                parent_id TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status_json);
            "#,
        )?;
        Ok(())
    }

    /// Insert a new job
    pub fn insert_job(&self, job: &Job) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO jobs (id, request_json, status_json, images_json, created_at, updated_at, parent_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                job.id,
                serde_json::to_string(&job.request)?,
                serde_json::to_string(&job.status)?,
                serde_json::to_string(&job.images)?,
                job.created_at.to_rfc3339(),
                job.updated_at.to_rfc3339(),
                job.parent_id,
            ],
        )?;
        Ok(())
    }

    /// Update an existing job
    pub fn update_job(&self, job: &Job) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            UPDATE jobs SET
                request_json = ?2,
                status_json = ?3,
                images_json = ?4,
                updated_at = ?5,
                parent_id = ?6
            WHERE id = ?1
            "#,
            params![
                job.id,
                serde_json::to_string(&job.request)?,
                serde_json::to_string(&job.status)?,
                serde_json::to_string(&job.images)?,
                job.updated_at.to_rfc3339(),
                job.parent_id,
            ],
        )?;
        Ok(())
    }

    /// Get a job by ID
    pub fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;

        stmt.query_row(params![id], read_row)
            .optional()?
            .map(row_to_job)
            .transpose()
    }

    /// List jobs, newest first, optionally filtered by status name
    pub fn list_jobs(&self, limit: u32, status_filter: Option<&str>) -> Result<Vec<Job>> {
        let conn = self.lock();

        let rows = if let Some(status) = status_filter {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE status_json LIKE ?1 ORDER BY created_at DESC LIMIT ?2",
                SELECT_COLUMNS
            ))?;
            let pattern = format!("%\"status\":\"{}\"%", status.to_lowercase());
            let rows = stmt
                .query_map(params![pattern, limit], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!(
                "{} ORDER BY created_at DESC LIMIT ?1",
                SELECT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![limit], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            match row_to_job(row) {
                Ok(job) => jobs.push(job),
                Err(e) => tracing::warn!("Skipping unreadable history row: {}", e),
            }
        }
        Ok(jobs)
    }

    /// Delete a job
    pub fn delete_job(&self, id: &str) -> Result<bool> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Delete every job, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock();
        Ok(conn.execute("DELETE FROM jobs", [])?)
    }

    pub fn count_jobs(&self) -> Result<i64> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count)
    }
}

type JobRow = (String, String, String, String, String, String, Option<String>);

fn read_row(row: &rusqlite::Row) -> rusqlite::Result<JobRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn row_to_job(row: JobRow) -> Result<Job> {
    let (id, request_json, status_json, images_json, created_at, updated_at, parent_id) = row;
    Ok(Job {
        id,
        request: serde_json::from_str(&request_json)?,
        status: serde_json::from_str(&status_json)?,
        images: serde_json::from_str(&images_json)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)?.with_timezone(&Utc),
        parent_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GenerationError, GenerationRequest, GenerationResult, JobStatus};
    use tempfile::TempDir;

    fn job(prompt: &str) -> Job {
        Job::new(GenerationRequest::new("secret-key", prompt).with_negative_prompt("blurry"))
    }

    #[test]
    fn test_insert_get_update() {
        let db = Database::open_in_memory().unwrap();
        let mut job = job("a red apple");
        db.insert_job(&job).unwrap();

        let loaded = db.get_job(&job.id).unwrap().unwrap();
        assert_eq!(loaded.request.prompt(), "a red apple");
        assert_eq!(loaded.request.negative_prompt(), Some("blurry"));
        assert_eq!(loaded.request.api_key(), "");
        assert_eq!(loaded.status, JobStatus::Queued);

        job.apply_result(&GenerationResult::Success {
            image_urls: vec!["https://x/img.png".to_string()],
        });
        job.set_image_path(0, "/out/img.png");
        db.update_job(&job).unwrap();

        let loaded = db.get_job(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.images.len(), 1);
        assert_eq!(loaded.images[0].path.as_deref(), Some("/out/img.png"));

        assert!(db.get_job("ap_missing").unwrap().is_none());
    }

    #[test]
    fn test_list_filter_delete_clear() {
        let db = Database::open_in_memory().unwrap();

        let mut failed = job("failed");
        failed.apply_result(&GenerationResult::Failure(GenerationError::Unsuccessful {
            status: Some("error".to_string()),
            message: None,
        }));
        let mut completed = job("done");
        completed.apply_result(&GenerationResult::Success {
            image_urls: vec!["u".to_string()],
        });

        db.insert_job(&completed).unwrap();
        db.insert_job(&failed).unwrap();
        assert_eq!(db.count_jobs().unwrap(), 2);

        let all = db.list_jobs(10, None).unwrap();
        assert_eq!(all.len(), 2);

        let only_failed = db.list_jobs(10, Some("failed")).unwrap();
        assert_eq!(only_failed.len(), 1);
        assert_eq!(only_failed[0].id, failed.id);

        assert_eq!(db.list_jobs(1, None).unwrap().len(), 1);

        assert!(db.delete_job(&failed.id).unwrap());
        assert!(!db.delete_job(&failed.id).unwrap());
        assert_eq!(db.clear().unwrap(), 1);
        assert_eq!(db.count_jobs().unwrap(), 0);
    }

    #[test]
    fn test_open_at_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.db");
        let job = job("persisted");

        Database::open_at(&path).unwrap().insert_job(&job).unwrap();
        let reopened = Database::open_at(&path).unwrap();
        assert_eq!(reopened.get_job(&job.id).unwrap().unwrap().id, job.id);
    }
}
