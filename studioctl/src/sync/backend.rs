use crate::{
    api::{
        client::ApiClient,
        handlers::Jobs,
        models::jobs::{JobFilter, JobsPage},
    },
    errors::Result,
};
use async_trait::async_trait;

/// The slice of the jobs API the job store depends on
#[async_trait]
pub trait JobsBackend: Send + Sync + 'static {
    /// First page of the user's jobs, newest first
    async fn recent_jobs(&self, limit: u32) -> Result<JobsPage>;

    async fn delete_job(&self, job_id: &str) -> Result<()>;

    async fn cancel_job(&self, job_id: &str) -> Result<()>;
}

#[async_trait]
impl JobsBackend for ApiClient {
    async fn recent_jobs(&self, limit: u32) -> Result<JobsPage> {
        Jobs::new(self).list(&JobFilter::new(1, limit)).await
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        Jobs::new(self).delete(job_id).await
    }

    async fn cancel_job(&self, job_id: &str) -> Result<()> {
        Jobs::new(self).cancel(job_id).await
    }
}
