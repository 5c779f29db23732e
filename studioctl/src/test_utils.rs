use crate::{
    api::{
        client::ApiClient,
        models::{
            api_keys::{ApiKey, ApiKeyCreate, ApiKeyCreated, ApiKeyTopUp, ApiKeysPage},
            credits::CreditBalance,
            jobs::{Job, JobCreateResponse, JobStatus, JobStatusResponse, JobType, JobsPage, Pagination},
            transactions::{Transaction, TransactionType, TransactionsPage},
            uploads::{BatchUploadRequest, UploadCheck, UploadCheckResponse, UploadRequest, UploadTicket},
        },
    },
    errors::{Error, Result},
    sync::backend::JobsBackend,
    types::{JobId, TempId},
};
use async_trait::async_trait;
use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    path::{Path as FsPath, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{net::TcpListener, task::JoinHandle};

pub const TEST_TOKEN: &str = "test-token";

/// A server job created an hour ago plus `offset_secs`
pub fn test_job(id: &str, status: JobStatus, offset_secs: i64) -> Job {
    let created_at = Utc::now() - ChronoDuration::hours(1) + ChronoDuration::seconds(offset_secs);
    Job {
        job_id: JobId::from(id),
        user_id: Some("u1".to_string()),
        job_type: JobType::TextToImage,
        model: "nano-banana".to_string(),
        prompt: format!("prompt for {id}"),
        status,
        credits_cost: 1,
        credits_refunded: false,
        output_url: None,
        error_message: None,
        created_at,
        updated_at: created_at,
    }
}

/// A freshly submitted placeholder
pub fn optimistic_job(temp: &TempId) -> Job {
    let now = Utc::now();
    Job {
        job_id: JobId::Temporary(temp.clone()),
        user_id: None,
        job_type: JobType::TextToImage,
        model: "nano-banana".to_string(),
        prompt: "cat".to_string(),
        status: JobStatus::Pending,
        credits_cost: 0,
        credits_refunded: false,
        output_url: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_transaction(id: &str, transaction_type: TransactionType, amount: i64, balance_before: i64) -> Transaction {
    let balance_after = if transaction_type.is_credit() {
        balance_before + amount
    } else {
        balance_before - amount
    };
    Transaction {
        id: id.to_string(),
        user_id: Some("u1".to_string()),
        transaction_type,
        amount,
        balance_before,
        balance_after,
        reason: None,
        job_id: None,
        created_at: Utc::now(),
    }
}

/// Write a blank PNG of the given size and return its path
pub fn write_png(dir: &FsPath, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::new(width, height).save(&path).expect("Failed to write test image");
    path
}

fn paginate<T: Clone>(items: &[T], page: Option<u32>, limit: Option<u32>) -> (Vec<T>, Pagination) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).max(1);
    let total = items.len() as u64;
    let pages = (total.div_ceil(u64::from(limit)) as u32).max(1);
    let start = ((page - 1) * limit) as usize;
    let slice = items.iter().skip(start).take(limit as usize).cloned().collect();
    (slice, Pagination { page, pages, total })
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

#[derive(Default)]
struct MockState {
    base_url: String,
    jobs: Vec<Job>,
    transactions: Vec<Transaction>,
    api_keys: Vec<ApiKey>,
    balance: i64,
    uploads: HashMap<String, bool>,
    upload_count: usize,
    request_count: usize,
    last_authorization: Option<String>,
    last_generate_body: Option<Value>,
    fail_deletes: bool,
    fail_uploads: bool,
    fail_generate: Option<(StatusCode, String)>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

type Shared = Arc<Mutex<MockState>>;

/// In-process studio backend bound to an ephemeral port
pub struct MockBackend {
    base_url: String,
    state: Shared,
    server: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl MockBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("Failed to read mock backend address");
        let base_url = format!("http://{addr}");

        let state: Shared = Arc::new(Mutex::new(MockState {
            base_url: base_url.clone(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/api/jobs", get(list_jobs))
            .route("/api/jobs/{id}", get(job_status).delete(delete_job))
            .route("/api/jobs/{id}/cancel", post(cancel_job))
            .route("/api/transactions", get(list_transactions))
            .route("/api/credits/balance", get(balance))
            .route("/api/admin/api-keys", get(list_api_keys).post(create_api_key))
            .route("/api/admin/api-keys/{id}/revoke", post(revoke_api_key))
            .route("/api/admin/api-keys/{id}/top-up", post(top_up_api_key))
            .route("/api/{endpoint}/upload/reference", post(upload_reference))
            .route("/api/{endpoint}/upload/batch", post(upload_batch))
            .route("/api/{endpoint}/upload/check", post(upload_check))
            .route("/api/{endpoint}/generate", post(generate))
            .route("/storage/{id}", put(store_upload))
            .layer(middleware::from_fn_with_state(state.clone(), track_and_authenticate))
            .with_state(state.clone());

        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Mock backend failed");
        });

        Self { base_url, state, server }
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(self.base_url.parse().unwrap(), Some(TEST_TOKEN.to_string()), None).expect("Failed to create client")
    }

    pub fn anonymous_client(&self) -> ApiClient {
        ApiClient::new(self.base_url.parse().unwrap(), None, None).expect("Failed to create client")
    }

    fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn insert_job(&self, job: Job) {
        self.with(|s| s.jobs.push(job));
    }

    pub fn job_count(&self) -> usize {
        self.with(|s| s.jobs.len())
    }

    /// Move a job to a terminal state the way the generation worker would
    pub fn finish_job(&self, id: &str, status: JobStatus, error: Option<&str>) {
        self.with(|s| {
            let job = s.jobs.iter_mut().find(|j| j.job_id == id).expect("no such job");
            job.status = status;
            job.error_message = error.map(str::to_string);
            if status == JobStatus::Completed {
                job.output_url = Some(format!("{}/files/{id}.png", s.base_url));
            }
            job.updated_at = Utc::now();
        });
    }

    pub fn insert_transaction(&self, transaction: Transaction) {
        self.with(|s| s.transactions.push(transaction));
    }

    pub fn set_balance(&self, balance: i64) {
        self.with(|s| s.balance = balance);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.with(|s| s.fail_deletes = fail);
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.with(|s| s.fail_uploads = fail);
    }

    pub fn fail_generate(&self, status: StatusCode, message: &str) {
        self.with(|s| s.fail_generate = Some((status, message.to_string())));
    }

    pub fn request_count(&self) -> usize {
        self.with(|s| s.request_count)
    }

    pub fn upload_count(&self) -> usize {
        self.with(|s| s.upload_count)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.with(|s| s.last_authorization.clone())
    }

    pub fn last_generate_body(&self) -> Option<Value> {
        self.with(|s| s.last_generate_body.clone())
    }
}

async fn track_and_authenticate(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    // Presigned storage URLs carry no bearer token
    let is_storage = request.uri().path().starts_with("/storage/");

    {
        let mut s = state.lock().unwrap();
        s.request_count += 1;
        if !is_storage {
            s.last_authorization = authorization.clone();
        }
    }

    if !is_storage && authorization.as_deref() != Some(format!("Bearer {TEST_TOKEN}").as_str()) {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    next.run(request).await
}

#[derive(Deserialize)]
struct JobsQuery {
    page: Option<u32>,
    limit: Option<u32>,
    status: Option<JobStatus>,
}

async fn list_jobs(State(state): State<Shared>, Query(query): Query<JobsQuery>) -> Json<JobsPage> {
    let s = state.lock().unwrap();
    let mut jobs: Vec<Job> = s
        .jobs
        .iter()
        .filter(|j| query.status.map_or(true, |status| j.status == status))
        .cloned()
        .collect();
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let (jobs, pagination) = paginate(&jobs, query.page, query.limit);
    Json(JobsPage { jobs, pagination })
}

async fn job_status(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let s = state.lock().unwrap();
    match s.jobs.iter().find(|j| j.job_id == id.as_str()) {
        Some(job) => Json(JobStatusResponse {
            status: job.status,
            result: job.output_url.clone(),
            error: job.error_message.clone(),
        })
        .into_response(),
        None => detail(StatusCode::NOT_FOUND, "Job not found"),
    }
}

async fn delete_job(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut s = state.lock().unwrap();
    if s.fail_deletes {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "Delete failed");
    }
    let before = s.jobs.len();
    s.jobs.retain(|j| j.job_id != id.as_str());
    if s.jobs.len() == before {
        return detail(StatusCode::NOT_FOUND, "Job not found");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn cancel_job(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut s = state.lock().unwrap();
    let Some(job) = s.jobs.iter_mut().find(|j| j.job_id == id.as_str()) else {
        return detail(StatusCode::NOT_FOUND, "Job not found");
    };
    if !job.status.is_active() {
        return detail(StatusCode::BAD_REQUEST, "Job already finished");
    }
    job.status = JobStatus::Cancelled;
    Json(json!({ "job_id": id, "status": "cancelled" })).into_response()
}

#[derive(Deserialize)]
struct TransactionsQuery {
    page: Option<u32>,
    limit: Option<u32>,
    #[serde(rename = "type")]
    transaction_type: Option<TransactionType>,
}

async fn list_transactions(State(state): State<Shared>, Query(query): Query<TransactionsQuery>) -> Json<TransactionsPage> {
    let s = state.lock().unwrap();
    let transactions: Vec<Transaction> = s
        .transactions
        .iter()
        .rev()
        .filter(|t| query.transaction_type.map_or(true, |ty| t.transaction_type == ty))
        .cloned()
        .collect();

    let (transactions, pagination) = paginate(&transactions, query.page, query.limit);
    Json(TransactionsPage { transactions, pagination })
}

async fn balance(State(state): State<Shared>) -> Json<CreditBalance> {
    let s = state.lock().unwrap();
    Json(CreditBalance {
        balance: s.balance,
        total_spent: 0,
        total_refunded: 0,
    })
}

#[derive(Deserialize)]
struct PageParams {
    page: Option<u32>,
    limit: Option<u32>,
}

async fn list_api_keys(State(state): State<Shared>, Query(query): Query<PageParams>) -> Json<ApiKeysPage> {
    let s = state.lock().unwrap();
    let (api_keys, pagination) = paginate(&s.api_keys, query.page, query.limit);
    Json(ApiKeysPage { api_keys, pagination })
}

async fn create_api_key(State(state): State<Shared>, Json(request): Json<ApiKeyCreate>) -> Json<ApiKeyCreated> {
    let mut s = state.lock().unwrap();
    let key_id = s.next_id("key_");
    let key_prefix = format!("sk-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let api_key = ApiKey {
        key_id,
        key_prefix: key_prefix.clone(),
        name: Some(request.name),
        user_id: request.user_id,
        balance: request.initial_balance.unwrap_or(Decimal::ZERO),
        is_active: true,
        created_at: Utc::now(),
        revoked_at: None,
        last_used_at: None,
    };
    s.api_keys.push(api_key.clone());

    Json(ApiKeyCreated {
        key: format!("{key_prefix}{}", uuid::Uuid::new_v4().simple()),
        api_key,
    })
}

async fn revoke_api_key(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut s = state.lock().unwrap();
    let Some(key) = s.api_keys.iter_mut().find(|k| k.key_id == id) else {
        return detail(StatusCode::NOT_FOUND, "API key not found");
    };
    key.is_active = false;
    key.revoked_at = Some(Utc::now());
    StatusCode::NO_CONTENT.into_response()
}

async fn top_up_api_key(State(state): State<Shared>, Path(id): Path<String>, Json(request): Json<ApiKeyTopUp>) -> Response {
    let mut s = state.lock().unwrap();
    let Some(key) = s.api_keys.iter_mut().find(|k| k.key_id == id) else {
        return detail(StatusCode::NOT_FOUND, "API key not found");
    };
    key.balance += request.amount;
    Json(key.clone()).into_response()
}

fn ticket(s: &mut MockState) -> UploadTicket {
    let id = s.next_id("upload_");
    s.uploads.insert(id.clone(), false);
    UploadTicket {
        url: format!("{}/files/{id}", s.base_url),
        upload_url: format!("{}/storage/{id}", s.base_url),
        id,
    }
}

async fn upload_reference(State(state): State<Shared>, Json(_request): Json<UploadRequest>) -> Json<UploadTicket> {
    Json(ticket(&mut state.lock().unwrap()))
}

async fn upload_batch(State(state): State<Shared>, Json(request): Json<BatchUploadRequest>) -> Json<Vec<UploadTicket>> {
    let mut s = state.lock().unwrap();
    Json(request.files.iter().map(|_| ticket(&mut s)).collect())
}

async fn upload_check(State(state): State<Shared>, Json(request): Json<UploadCheck>) -> Json<UploadCheckResponse> {
    let s = state.lock().unwrap();
    Json(UploadCheckResponse {
        exists: s.uploads.get(&request.id).copied().unwrap_or(false),
        id: request.id,
    })
}

async fn store_upload(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let mut guard = state.lock().unwrap();
    let s = &mut *guard;
    if s.fail_uploads {
        return (StatusCode::FORBIDDEN, "Access denied").into_response();
    }
    match s.uploads.get_mut(&id) {
        Some(received) => {
            *received = true;
            s.upload_count += 1;
            StatusCode::OK.into_response()
        }
        None => (StatusCode::NOT_FOUND, "No such upload").into_response(),
    }
}

async fn generate(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut s = state.lock().unwrap();
    s.last_generate_body = Some(body.clone());
    if let Some((status, message)) = s.fail_generate.clone() {
        return detail(status, &message);
    }

    let job_id = s.next_id("job_");
    let job_type = serde_json::from_value(body["type"].clone()).unwrap_or(JobType::TextToImage);
    let now = Utc::now();
    s.jobs.push(Job {
        job_id: JobId::from(job_id.as_str()),
        user_id: Some("u1".to_string()),
        job_type,
        model: body["model"].as_str().unwrap_or_default().to_string(),
        prompt: body["prompt"].as_str().unwrap_or_default().to_string(),
        status: JobStatus::Pending,
        credits_cost: 1,
        credits_refunded: false,
        output_url: None,
        error_message: None,
        created_at: now,
        updated_at: now,
    });
    Json(JobCreateResponse { job_id }).into_response()
}

/// Scriptable [`JobsBackend`] for store and poller tests
#[derive(Default)]
pub struct MockJobsBackend {
    jobs: Mutex<Vec<Job>>,
    list_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    fail_lists: AtomicBool,
    fail_deletes: AtomicBool,
    fail_cancels: AtomicBool,
    next_list_delay: Mutex<Option<Duration>>,
    next_cancel_delay: Mutex<Option<Duration>>,
}

impl MockJobsBackend {
    pub fn set_jobs(&self, jobs: Vec<Job>) {
        *self.jobs.lock().unwrap() = jobs;
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Hold the next listing for `delay`, answering with the jobs as they were when it was issued
    pub fn delay_next_list(&self, delay: Duration) {
        *self.next_list_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }

    /// Hold the next cancel request for `delay` before the server applies it
    pub fn delay_next_cancel(&self, delay: Duration) {
        *self.next_cancel_delay.lock().unwrap() = Some(delay);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    fn server_error(message: &str) -> Error {
        Error::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl JobsBackend for MockJobsBackend {
    async fn recent_jobs(&self, limit: u32) -> Result<JobsPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut jobs = self.jobs.lock().unwrap().clone();
        let delay = self.next_list_delay.lock().unwrap().take();
        let failing = self.fail_lists.load(Ordering::SeqCst);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(Self::server_error("Internal Server Error"));
        }

        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let (jobs, pagination) = paginate(&jobs, Some(1), Some(limit));
        Ok(JobsPage { jobs, pagination })
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::server_error("Delete failed"));
        }
        self.jobs.lock().unwrap().retain(|j| j.job_id != job_id);
        Ok(())
    }

    async fn cancel_job(&self, job_id: &str) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.next_cancel_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_cancels.load(Ordering::SeqCst) {
            return Err(Error::Http {
                status: StatusCode::CONFLICT,
                message: "Job already finished".to_string(),
            });
        }
        if let Some(job) = self.jobs.lock().unwrap().iter_mut().find(|j| j.job_id == job_id) {
            job.status = JobStatus::Cancelled;
        }
        Ok(())
    }
}
