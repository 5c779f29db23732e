use crate::{
    api::{
        client::{ApiClient, NO_QUERY},
        handlers::repository::{Page, PagedResource},
        models::jobs::{Job, JobFilter, JobStatus, JobStatusResponse, JobsPage},
    },
    errors::Result,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Jobs owned by the current user
pub struct Jobs<'c> {
    client: &'c ApiClient,
}

impl<'c> Jobs<'c> {
    pub fn new(client: &'c ApiClient) -> Self {
        Self { client }
    }

    /// List one page of jobs, newest first
    #[instrument(skip(self), err)]
    pub async fn list(&self, filter: &JobFilter) -> Result<JobsPage> {
        let page: JobsPage = self.client.get(&["api", "jobs"], filter).await?;
        debug!("Listed {} jobs (page {}/{})", page.jobs.len(), page.pagination.page, page.pagination.pages);
        Ok(page)
    }

    /// Convenience form of [`Jobs::list`]; the page is floored at 1 but not clamped
    pub async fn get_my_jobs(&self, page: u32, page_size: u32, status: Option<JobStatus>) -> Result<JobsPage> {
        self.list(&JobFilter::new(page, page_size).with_status(status)).await
    }

    /// Status of a single job
    #[instrument(skip(self), err)]
    pub async fn status(&self, job_id: &str) -> Result<JobStatusResponse> {
        self.client.get(&["api", "jobs", job_id], NO_QUERY).await
    }

    #[instrument(skip(self), err)]
    pub async fn delete(&self, job_id: &str) -> Result<()> {
        self.client.delete(&["api", "jobs", job_id]).await
    }

    /// Ask the backend to stop a pending or processing job
    #[instrument(skip(self), err)]
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        self.client.post_action(&["api", "jobs", job_id, "cancel"]).await
    }
}

#[async_trait]
impl PagedResource for Jobs<'_> {
    type Item = Job;
    type Filter = JobFilter;

    async fn fetch_page(&self, filter: &JobFilter) -> Result<Page<Job>> {
        let page = self.list(filter).await?;
        Ok(Page {
            items: page.jobs,
            pagination: page.pagination,
        })
    }
}
