//! Submitting generation requests: reference uploads, the generate call, and the optimistic
//! entry that shows the job before the backend has acknowledged it.

use crate::{
    api::{
        client::ApiClient,
        handlers::Uploads,
        models::{
            jobs::{Job, JobCreateResponse, JobStatus, JobType},
            uploads::{UploadRequest, UploadTicket, UploadedReference},
        },
    },
    errors::{Error, Result},
    sync::store::{JobStore, OptimisticJob},
    types::{JobId, TempId},
};
use bon::Builder;
use bytes::Bytes;
use serde::Serialize;
use std::{io::Cursor, path::Path};
use tracing::{debug, info, instrument, warn};

/// An image the generation is conditioned on
#[derive(Debug, Clone)]
pub struct ReferenceAsset {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ReferenceAsset {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing the content type from its extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reference".to_string());
        let content_type = mime_guess::from_path(path).first_or_octet_stream().essence_str().to_string();

        Ok(Self::new(file_name, content_type, bytes))
    }

    /// Pixel dimensions, read from the image header
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let reader = image::ImageReader::new(Cursor::new(&self.bytes[..])).with_guessed_format()?;
        Ok(reader.into_dimensions()?)
    }
}

/// One generation to submit
#[derive(Debug, Clone, Builder)]
pub struct GenerationRequest {
    /// Generation endpoint, e.g. `nano-banana` or `sora`
    #[builder(into)]
    pub endpoint: String,
    pub job_type: JobType,
    #[builder(into)]
    pub model: String,
    #[builder(into)]
    pub prompt: String,
    /// Endpoint specific options (aspect ratio, duration, ...), sent as-is
    #[builder(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
    #[builder(default)]
    pub references: Vec<ReferenceAsset>,
    /// Credits the caller expects the job to cost, shown on the optimistic entry
    pub credits_cost: Option<u64>,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    model: &'a str,
    #[serde(rename = "type")]
    job_type: JobType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    references: Vec<UploadedReference>,
    #[serde(flatten)]
    parameters: &'a serde_json::Map<String, serde_json::Value>,
}

/// Ids of a job that has been accepted by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub temp_id: TempId,
    pub job_id: String,
}

impl SubmittedJob {
    pub fn id(&self) -> JobId {
        JobId::Confirmed(self.job_id.clone())
    }
}

/// Submits generations and tracks them through the shared [`JobStore`]
pub struct Submitter<'a> {
    client: &'a ApiClient,
    store: &'a JobStore,
}

impl<'a> Submitter<'a> {
    pub fn new(client: &'a ApiClient, store: &'a JobStore) -> Self {
        Self { client, store }
    }

    /// Upload references and start the generation.
    ///
    /// The job is on the store's list before anything is sent. If any step fails the
    /// placeholder is removed again and the error is returned; nothing is retried.
    #[instrument(skip(self, request), fields(endpoint = %request.endpoint, job_type = %request.job_type), err)]
    pub async fn submit(&self, request: &GenerationRequest) -> Result<SubmittedJob> {
        if request.prompt.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "Prompt must not be empty".to_string(),
            });
        }
        if request.job_type.needs_reference() && request.references.is_empty() {
            return Err(Error::BadRequest {
                message: format!("{} generations need at least one reference image", request.job_type),
            });
        }

        let temp_id = self.store.add_optimistic_job(
            OptimisticJob::builder()
                .job_type(request.job_type)
                .model(request.model.as_str())
                .prompt(request.prompt.as_str())
                .maybe_credits_cost(request.credits_cost)
                .build(),
        );

        match self.send(request, &temp_id).await {
            Ok(job_id) => {
                self.store.update_optimistic_job(&temp_id, job_id.clone(), Some(JobStatus::Pending));
                info!("Submitted {} job {job_id}", request.job_type);
                Ok(SubmittedJob { temp_id, job_id })
            }
            Err(e) => {
                warn!("Submission failed, withdrawing {temp_id}: {e}");
                if let Err(remove_err) = self.store.remove_job(&JobId::Temporary(temp_id)).await {
                    warn!("Failed to withdraw placeholder: {remove_err}");
                }
                Err(e)
            }
        }
    }

    async fn send(&self, request: &GenerationRequest, temp_id: &TempId) -> Result<String> {
        let references = self.upload_references(&request.endpoint, &request.references).await?;

        // Cancelled while the references were uploading
        let placeholder = JobId::Temporary(temp_id.clone());
        if self.store.get(&placeholder).is_some_and(|job| job.status == JobStatus::Cancelled) {
            return Err(Error::Cancelled {
                job_id: placeholder.to_string(),
            });
        }

        let body = GenerateBody {
            prompt: &request.prompt,
            model: &request.model,
            job_type: request.job_type,
            references,
            parameters: &request.parameters,
        };
        let created: JobCreateResponse = self
            .client
            .post(&["api", request.endpoint.as_str(), "generate"], &body)
            .await?;
        Ok(created.job_id)
    }

    async fn upload_references(&self, endpoint: &str, assets: &[ReferenceAsset]) -> Result<Vec<UploadedReference>> {
        if assets.is_empty() {
            return Ok(Vec::new());
        }

        // Reject unreadable images before asking for upload slots
        let dimensions = assets.iter().map(ReferenceAsset::dimensions).collect::<Result<Vec<_>>>()?;

        let uploads = Uploads::new(self.client, endpoint);
        let tickets: Vec<UploadTicket> = match assets {
            [single] => vec![uploads.reference(&single.file_name, &single.content_type).await?],
            many => {
                let files = many
                    .iter()
                    .map(|a| UploadRequest {
                        file_name: a.file_name.clone(),
                        content_type: a.content_type.clone(),
                    })
                    .collect();
                uploads.batch(files).await?
            }
        };

        let mut uploaded = Vec::with_capacity(assets.len());
        for ((asset, ticket), (width, height)) in assets.iter().zip(tickets).zip(dimensions) {
            self.client
                .put_upload(&ticket.upload_url, asset.bytes.clone(), &asset.content_type)
                .await?;
            uploads.check(&ticket.id).await?;
            debug!("Uploaded {} as {} ({width}x{height})", asset.file_name, ticket.id);

            uploaded.push(UploadedReference {
                id: ticket.id,
                url: ticket.url,
                width,
                height,
            });
        }
        Ok(uploaded)
    }

    /// Wait for a submitted job to finish
    pub async fn wait(&self, submitted: &SubmittedJob) -> Result<Job> {
        let job = self.store.wait_for_terminal(&submitted.id()).await?;
        match job.status {
            JobStatus::Completed => Ok(job),
            JobStatus::Cancelled => Err(Error::Cancelled {
                job_id: submitted.job_id.clone(),
            }),
            _ => Err(Error::GenerationFailed {
                job_id: submitted.job_id.clone(),
                message: job.error_message.unwrap_or_else(|| "Generation failed".to_string()),
            }),
        }
    }
}
