use crate::{
    api::models::jobs::{Job, JobStatus, JobType},
    config::Config,
    errors::{Error, Result},
    sync::{
        backend::JobsBackend,
        poller,
        state::{ApplyOutcome, JobsState},
    },
    types::{JobId, TempId, UserId},
};
use bon::Builder;
use chrono::{DateTime, Utc};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, trace, warn};

/// Timing and sizing knobs for a [`JobStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub page_size: u32,
    pub poll_interval: Duration,
    pub refresh_delay: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            page_size: 20,
            poll_interval: Duration::from_secs(3),
            refresh_delay: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for StoreSettings {
    fn from(config: &Config) -> Self {
        Self {
            page_size: config.page_size,
            poll_interval: config.poll_interval,
            refresh_delay: config.refresh_delay,
        }
    }
}

/// The fields a caller knows at submission time. Everything else gets a default.
#[derive(Debug, Clone, Builder)]
pub struct OptimisticJob {
    pub job_type: JobType,
    #[builder(into)]
    pub model: String,
    #[builder(into)]
    pub prompt: String,
    pub user_id: Option<UserId>,
    pub status: Option<JobStatus>,
    pub credits_cost: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
}

struct Inner {
    backend: Arc<dyn JobsBackend>,
    state: watch::Sender<JobsState>,
    settings: StoreSettings,
    /// Sequence number handed to the most recently issued refresh
    issued_seq: AtomicU64,
    shutdown: CancellationToken,
}

/// Session-wide, deduplicated view of the user's jobs.
///
/// Blends the latest server page with submissions the backend has not echoed back yet,
/// and keeps itself current with a single poller while any job is pending or processing.
/// Observers get every change through [`JobStore::subscribe`]. Clones share state.
#[derive(Clone)]
pub struct JobStore {
    inner: Arc<Inner>,
}

impl JobStore {
    /// Build a store without a poller. Useful when the caller drives refreshes itself.
    pub fn new(backend: Arc<dyn JobsBackend>, settings: StoreSettings) -> Self {
        let (state, _) = watch::channel(JobsState::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                state,
                settings,
                issued_seq: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Build a store and start its poller. Dropping the guard stops the poller and any
    /// scheduled refreshes (e.g. on logout).
    pub fn start(backend: Arc<dyn JobsBackend>, settings: StoreSettings) -> (Self, DropGuard) {
        let store = Self::new(backend, settings);
        let guard = store.inner.shutdown.clone().drop_guard();
        tokio::spawn(poller::run(store.clone(), store.inner.shutdown.clone()));
        debug!(
            "Job store started, polling every {} while jobs are active",
            humantime::format_duration(settings.poll_interval)
        );
        (store, guard)
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    /// Stop the poller and pending follow-up refreshes
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Observe every state change
    pub fn subscribe(&self) -> watch::Receiver<JobsState> {
        self.inner.state.subscribe()
    }

    /// The merged list, newest first
    pub fn jobs(&self) -> Vec<Job> {
        self.inner.state.borrow().merged()
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.inner.state.borrow().get(id).cloned()
    }

    pub fn has_active_jobs(&self) -> bool {
        self.inner.state.borrow().has_active()
    }

    /// Show a submission immediately, before the backend has seen it
    pub fn add_optimistic_job(&self, draft: OptimisticJob) -> TempId {
        let temp_id = TempId::generate();
        let now = Utc::now();
        let job = Job {
            job_id: JobId::Temporary(temp_id.clone()),
            user_id: draft.user_id,
            job_type: draft.job_type,
            model: draft.model,
            prompt: draft.prompt,
            status: draft.status.unwrap_or(JobStatus::Pending),
            credits_cost: draft.credits_cost.unwrap_or(0),
            credits_refunded: false,
            output_url: None,
            error_message: None,
            created_at: draft.created_at.unwrap_or(now),
            updated_at: now,
        };

        self.inner.state.send_modify(|state| state.push_optimistic(job));
        debug!("Added optimistic job {temp_id}");
        temp_id
    }

    /// Attach the backend's id to a placeholder and schedule a refresh shortly after so the
    /// server's own record can take over. Returns false if the placeholder is unknown.
    pub fn update_optimistic_job(&self, temp_id: &TempId, real_id: impl Into<String>, status: Option<JobStatus>) -> bool {
        let real_id = real_id.into();
        let confirmed = JobId::Confirmed(real_id.clone());
        let mut cancelled_locally = false;
        let found = self.inner.state.send_if_modified(|state| {
            let found = state.confirm_optimistic(temp_id, real_id.clone(), status);
            cancelled_locally = state.get(&confirmed).is_some_and(|job| job.status == JobStatus::Cancelled);
            found
        });

        if !found {
            warn!("No optimistic job {temp_id} to confirm as {real_id}");
            return false;
        }

        info!("Job {temp_id} confirmed as {real_id}");
        if cancelled_locally {
            // Cancelled before the backend knew about it
            self.forward_cancel(real_id);
        }
        self.schedule_refresh(self.inner.settings.refresh_delay);
        true
    }

    /// Send a cancellation the user made while the job only existed locally. If the
    /// backend refuses, the local record is dropped so the server's state shows instead.
    fn forward_cancel(&self, real_id: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, job {real_id} stays cancelled locally only");
            return;
        };

        let store = self.clone();
        let shutdown = self.inner.shutdown.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                result = store.inner.backend.cancel_job(&real_id) => match result {
                    Ok(()) => info!("Cancelled job {real_id} on the backend"),
                    Err(e) => {
                        warn!("Backend did not cancel job {real_id}: {e}");
                        let id = JobId::Confirmed(real_id.clone());
                        store.inner.state.send_if_modified(|state| state.remove_local(&id));
                        if let Err(e) = store.refresh_jobs().await {
                            warn!("Job refresh failed: {e}");
                        }
                    }
                }
            }
        });
    }

    fn schedule_refresh(&self, delay: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, skipping follow-up refresh");
            return;
        };

        let store = self.clone();
        let shutdown = self.inner.shutdown.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = store.refresh_jobs().await {
                        warn!("Follow-up job refresh failed: {e}");
                    }
                }
            }
        });
    }

    /// Remove a job. Placeholders are dropped locally; confirmed jobs are deleted on the
    /// backend first and the local list is left untouched if that fails.
    #[instrument(skip(self), fields(job_id = %id), err)]
    pub async fn remove_job(&self, id: &JobId) -> Result<()> {
        if let JobId::Confirmed(real_id) = id {
            self.inner.backend.delete_job(real_id).await?;
        }

        let issued = self.inner.issued_seq.load(Ordering::SeqCst);
        self.inner.state.send_if_modified(|state| {
            // A refresh issued before the delete may still list the job
            state.invalidate_through(issued);
            state.remove_local(id)
        });
        info!("Removed job {id}");
        Ok(())
    }

    /// Cancel a pending or processing job
    #[instrument(skip(self), fields(job_id = %id), err)]
    pub async fn cancel_job(&self, id: &JobId) -> Result<()> {
        let current = self.get(id).ok_or_else(|| Error::NotFound {
            resource: "Job".to_string(),
            id: id.to_string(),
        })?;
        if !current.status.is_active() {
            return Err(Error::InvalidTransition {
                job_id: id.to_string(),
                from: current.status,
                to: JobStatus::Cancelled,
            });
        }

        let on_backend = match id {
            JobId::Confirmed(real_id) => {
                self.inner.backend.cancel_job(real_id).await?;
                true
            }
            JobId::Temporary(_) => false,
        };

        let issued = self.inner.issued_seq.load(Ordering::SeqCst);
        let mut result = Ok(());
        self.inner.state.send_modify(|state| {
            state.invalidate_through(issued);
            result = state.transition(id, JobStatus::Cancelled);
        });

        match result {
            Ok(()) => {
                info!("Cancelled job {id}");
                Ok(())
            }
            // A refresh finished or removed the job while the request was in flight
            Err(Error::InvalidTransition { from, .. }) if on_backend && from.is_terminal() => {
                debug!("Job {id} became {from} while cancelling");
                Ok(())
            }
            Err(Error::NotFound { .. }) if on_backend => {
                debug!("Job {id} left the list while cancelling");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the first page of jobs and reconcile it with the optimistic entries
    #[instrument(skip(self), err)]
    pub async fn refresh_jobs(&self) -> Result<()> {
        let seq = self.inner.issued_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let page = self.inner.backend.recent_jobs(self.inner.settings.page_size).await?;

        let mut outcome = ApplyOutcome::Stale;
        self.inner.state.send_if_modified(|state| {
            outcome = state.apply_server_jobs(seq, page.jobs);
            matches!(outcome, ApplyOutcome::Applied { changed: true, .. })
        });

        match outcome {
            ApplyOutcome::Stale => debug!("Discarded stale job refresh #{seq}"),
            ApplyOutcome::Applied { changed, superseded } => {
                trace!("Applied job refresh #{seq} (changed: {changed}, superseded: {superseded})")
            }
        }
        Ok(())
    }

    /// Wait until the job is in a terminal state and return it.
    ///
    /// Pass the confirmed id: a placeholder id disappears once it is confirmed.
    pub async fn wait_for_terminal(&self, id: &JobId) -> Result<Job> {
        let mut rx = self.subscribe();
        let cancelled = || Error::Cancelled { job_id: id.to_string() };

        tokio::select! {
            _ = self.inner.shutdown.cancelled() => Err(cancelled()),
            state = rx.wait_for(|state| state.get(id).is_some_and(|job| job.status.is_terminal())) => {
                let state = state.map_err(|_| cancelled())?;
                state.get(id).cloned().ok_or_else(cancelled)
            }
        }
    }
}
