use crate::types::{JobId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of generation a job performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum JobType {
    #[serde(rename = "t2i", alias = "text-to-image")]
    #[value(name = "t2i")]
    TextToImage,
    #[serde(rename = "i2i", alias = "image-to-image")]
    #[value(name = "i2i")]
    ImageToImage,
    #[serde(rename = "t2v", alias = "text-to-video")]
    #[value(name = "t2v")]
    TextToVideo,
    #[serde(rename = "i2v", alias = "image-to-video")]
    #[value(name = "i2v")]
    ImageToVideo,
    #[serde(rename = "motion")]
    #[value(name = "motion")]
    Motion,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::TextToImage => "t2i",
            JobType::ImageToImage => "i2i",
            JobType::TextToVideo => "t2v",
            JobType::ImageToVideo => "i2v",
            JobType::Motion => "motion",
        }
    }

    /// Whether the generation needs at least one reference image
    pub fn needs_reference(&self) -> bool {
        matches!(self, JobType::ImageToImage | JobType::ImageToVideo | JobType::Motion)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a job: pending -> processing -> completed | failed, with cancelled
/// reachable from either active state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    #[serde(alias = "error")]
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl JobStatus {
    /// Pending and processing jobs keep the poller armed
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Whether a job in this status may be reported as `next`.
    ///
    /// Repeating the current status is always allowed so terminal reports stay idempotent.
    /// Polls can miss `processing`, so pending may jump straight to a terminal state.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            JobStatus::Pending => true,
            JobStatus::Processing => next != JobStatus::Pending,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| format!("unknown job status: {s}"))
    }
}

/// One generation request and its lifecycle, as the backend reports it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub job_id: JobId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    pub status: JobStatus,
    #[serde(default)]
    pub credits_cost: u64,
    #[serde(default)]
    pub credits_refunded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Page-based pagination block, pages are 1-indexed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

impl Pagination {
    /// Clamp a requested page into `[1, pages]`. An empty collection still has page 1.
    pub fn clamp_page(&self, requested: i64) -> u32 {
        let last = i64::from(self.pages.max(1));
        requested.clamp(1, last) as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, pages: 1, total: 0 }
    }
}

// Response models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobsPage {
    pub jobs: Vec<Job>,
    pub pagination: Pagination,
}

/// Body of `GET /api/jobs/{job_id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobCreateResponse {
    pub job_id: String,
}

/// Query parameters for listing jobs
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobFilter {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}

impl JobFilter {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
            status: None,
        }
    }

    pub fn with_status(mut self, status: Option<JobStatus>) -> Self {
        self.status = status;
        self
    }

    /// Clamp the page against the last pagination the backend returned
    pub fn clamped(mut self, pagination: &Pagination) -> Self {
        self.page = pagination.clamp_page(i64::from(self.page));
        self
    }
}
