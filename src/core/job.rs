use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::GenerationRequest;
use super::result::GenerationResult;

/// One image URL returned by the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobImage {
    /// Position in the service's output list
    pub index: usize,
    /// Remote URL
    pub url: String,
    /// Local file path (after download)
    pub path: Option<String>,
}

/// Status of a job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is queued
    Queued,
    /// Request is in flight
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed
    Failed {
        /// Failure class (transport, decode, unsuccessful)
        kind: String,
        /// Error message
        error: String,
    },
    /// Abandoned by the user before the result arrived
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed { error, .. } => write!(f, "failed: {}", error),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed { .. } | JobStatus::Cancelled)
    }
}

/// A recorded generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID (e.g., "ap_abc12345")
    pub id: String,

    /// Request as submitted (API key is never stored)
    pub request: GenerationRequest,

    /// Current status
    pub status: JobStatus,

    /// Returned images
    pub images: Vec<JobImage>,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the job was last updated
    pub updated_at: DateTime<Utc>,

    /// Job this one retried, if any
    pub parent_id: Option<String>,
}

impl Job {
    pub fn new(request: GenerationRequest) -> Self {
        let uuid = Uuid::new_v4();
        let id = format!("ap_{}", &uuid.simple().to_string()[..8]);
        let now = Utc::now();

        Self {
            id,
            request,
            status: JobStatus::Queued,
            images: Vec::new(),
            created_at: now,
            updated_at: now,
            parent_id: None,
        }
    }

    /// Create a job that re-issues `parent`'s request
    pub fn retry_of(parent: &Job, request: GenerationRequest) -> Self {
        let mut job = Self::new(request);
        job.parent_id = Some(parent.id.clone());
        job
    }

    pub fn set_running(&mut self) {
        self.status = JobStatus::Running;
        self.updated_at = Utc::now();
    }

    pub fn set_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.updated_at = Utc::now();
    }

    /// Record the outcome of the generation call
    pub fn apply_result(&mut self, result: &GenerationResult) {
        match result {
            GenerationResult::Success { image_urls } => {
                self.images = image_urls
                    .iter()
                    .enumerate()
                    .map(|(i, url)| JobImage {
                        index: i,
                        url: url.clone(),
                        path: None,
                    })
                    .collect();
                self.status = JobStatus::Completed;
            }
            GenerationResult::Failure(err) => {
                self.status = JobStatus::Failed {
                    kind: err.kind().to_string(),
                    error: err.to_string(),
                };
            }
        }
        self.updated_at = Utc::now();
    }

    /// Remember where an image was saved
    pub fn set_image_path(&mut self, index: usize, path: impl Into<String>) {
        if let Some(image) = self.images.iter_mut().find(|img| img.index == index) {
            image.path = Some(path.into());
            self.updated_at = Utc::now();
        }
    }

    pub fn prompt_preview(&self, max_len: usize) -> String {
        self.request.prompt_preview(max_len)
    }

    /// Get status as a simple string for filtering
    pub fn status_name(&self) -> &'static str {
        match &self.status {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed { .. } => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}
