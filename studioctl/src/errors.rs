use crate::api::models::jobs::JobStatus;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The request never produced a response (connection refused, DNS, TLS, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A response arrived but its body was not the JSON we expected
    #[error("Failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unauthorized: the access token is missing or expired, log in again")]
    Unauthorized,

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Any other non-2xx response; `message` is the backend's `detail` when it sent one
    #[error("HTTP {status}: {message}")]
    Http { status: StatusCode, message: String },

    #[error("Upload failed with HTTP {status}: {body}")]
    Upload { status: StatusCode, body: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition { job_id: String, from: JobStatus, to: JobStatus },

    #[error("Generation {job_id} failed: {message}")]
    GenerationFailed { job_id: String, message: String },

    #[error("Generation {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read image: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// The HTTP status behind this error, when there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            Error::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Error::Http { status, .. } | Error::Upload { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Transport-level failures that are worth trying again on the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Http { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
