use crate::{
    api::models::jobs::{Job, JobStatus},
    errors::{Error, Result},
    types::{JobId, TempId},
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Snapshot of everything the job store knows.
///
/// `server_jobs` is the last page the backend returned and is replaced wholesale.
/// `optimistic_jobs` are submissions the backend has not echoed back yet.
#[derive(Debug, Clone, Default)]
pub struct JobsState {
    server_jobs: Vec<Job>,
    optimistic_jobs: Vec<Job>,
    applied_seq: u64,
}

/// What happened to a server response handed to [`JobsState::apply_server_jobs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A newer response was already applied; nothing changed
    Stale,
    Applied { changed: bool, superseded: usize },
}

impl JobsState {
    pub fn server_jobs(&self) -> &[Job] {
        &self.server_jobs
    }

    pub fn optimistic_jobs(&self) -> &[Job] {
        &self.optimistic_jobs
    }

    #[cfg(test)]
    pub(crate) fn applied_seq(&self) -> u64 {
        self.applied_seq
    }

    fn is_shadowed(&self, job: &Job) -> bool {
        self.optimistic_jobs.iter().any(|o| o.job_id == job.job_id)
    }

    fn visible(&self) -> impl Iterator<Item = &Job> {
        self.optimistic_jobs
            .iter()
            .chain(self.server_jobs.iter().filter(move |job| !self.is_shadowed(job)))
    }

    /// The deduplicated list: optimistic entries plus server entries they do not shadow,
    /// newest first
    pub fn merged(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.visible().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    pub fn has_active(&self) -> bool {
        self.visible().any(|job| job.status.is_active())
    }

    /// Look a job up in the merged view
    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.visible().find(|job| &job.job_id == id)
    }

    pub(crate) fn push_optimistic(&mut self, job: Job) {
        self.optimistic_jobs.insert(0, job);
    }

    /// Swap a placeholder id for the backend's id, optionally moving the status along.
    /// Returns false if no placeholder with that id exists.
    pub(crate) fn confirm_optimistic(&mut self, temp: &TempId, real_id: String, status: Option<JobStatus>) -> bool {
        let temp_id = JobId::Temporary(temp.clone());
        let Some(job) = self.optimistic_jobs.iter_mut().find(|job| job.job_id == temp_id) else {
            return false;
        };

        job.job_id = JobId::Confirmed(real_id);
        if let Some(next) = status {
            if job.status.can_transition_to(next) {
                job.status = next;
            } else {
                warn!("Ignoring status {next} for job {}, it is already {}", job.job_id, job.status);
            }
        }
        job.updated_at = Utc::now();
        true
    }

    /// Drop a job from both lists. Returns whether anything was removed.
    pub(crate) fn remove_local(&mut self, id: &JobId) -> bool {
        let before = self.optimistic_jobs.len() + self.server_jobs.len();
        self.optimistic_jobs.retain(|job| &job.job_id != id);
        self.server_jobs.retain(|job| &job.job_id != id);
        before != self.optimistic_jobs.len() + self.server_jobs.len()
    }

    /// Move the visible copy of a job to `next`, enforcing the status state machine
    pub(crate) fn transition(&mut self, id: &JobId, next: JobStatus) -> Result<()> {
        let shadowed = self.optimistic_jobs.iter().any(|job| &job.job_id == id);
        let job = if shadowed {
            self.optimistic_jobs.iter_mut().find(|job| &job.job_id == id)
        } else {
            self.server_jobs.iter_mut().find(|job| &job.job_id == id)
        };
        let Some(job) = job else {
            return Err(Error::NotFound {
                resource: "Job".to_string(),
                id: id.to_string(),
            });
        };

        if !job.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                job_id: id.to_string(),
                from: job.status,
                to: next,
            });
        }
        if job.status != next {
            job.status = next;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Mark every response issued up to `seq` as outdated
    pub(crate) fn invalidate_through(&mut self, seq: u64) {
        self.applied_seq = self.applied_seq.max(seq);
    }

    /// Replace the server page with a fresh response issued as request `seq`.
    ///
    /// Responses older than the last applied one are dropped. Jobs that are already
    /// terminal locally keep their existing record. Optimistic jobs whose id now appears
    /// in the server page are superseded by it.
    pub(crate) fn apply_server_jobs(&mut self, seq: u64, incoming: Vec<Job>) -> ApplyOutcome {
        if seq <= self.applied_seq {
            return ApplyOutcome::Stale;
        }
        self.applied_seq = seq;

        let mut previous: HashMap<JobId, Job> = self
            .server_jobs
            .iter()
            .chain(self.optimistic_jobs.iter().filter(|job| !job.job_id.is_temporary()))
            .filter(|job| job.status.is_terminal())
            .map(|job| (job.job_id.clone(), job.clone()))
            .collect();

        let server_jobs: Vec<Job> = incoming
            .into_iter()
            .map(|job| match previous.remove(&job.job_id) {
                Some(kept) => {
                    if kept.status != job.status {
                        warn!(
                            "Backend reported {} for job {} which is already {}, keeping {}",
                            job.status, job.job_id, kept.status, kept.status
                        );
                    }
                    kept
                }
                None => job,
            })
            .collect();

        let server_ids: HashSet<&JobId> = server_jobs.iter().map(|job| &job.job_id).collect();
        let optimistic_before = self.optimistic_jobs.len();
        self.optimistic_jobs.retain(|job| !server_ids.contains(&job.job_id));
        let superseded = optimistic_before - self.optimistic_jobs.len();

        let changed = superseded > 0 || server_jobs != self.server_jobs;
        self.server_jobs = server_jobs;
        ApplyOutcome::Applied { changed, superseded }
    }
}
