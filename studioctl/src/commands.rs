//! `studioctl` subcommands. Everything prints plain text to stdout.

use crate::{
    api::{
        client::ApiClient,
        handlers::{repository::PageQuery, ApiKeys, Credits, Jobs, Transactions},
        models::{
            api_keys::{ApiKey, ApiKeyCreate},
            jobs::{Job, JobFilter, JobStatus, JobType},
            transactions::{TransactionFilter, TransactionType},
        },
    },
    config::Config,
    errors::{Error, Result},
    generation::{GenerationRequest, ReferenceAsset, Submitter},
    sync::store::{JobStore, StoreSettings},
    types::JobId,
};
use clap::{Args as ClapArgs, Subcommand};
use rust_decimal::Decimal;
use std::{collections::HashMap, path::PathBuf, sync::Arc};
use tracing::debug;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect and manage generation jobs
    Jobs {
        #[command(subcommand)]
        command: JobsCommand,
    },
    /// Submit a generation
    Generate(GenerateArgs),
    /// Credit ledger
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommand,
    },
    /// Show the current credit balance
    Credits,
    /// Manage API keys (admin)
    ApiKeys {
        #[command(subcommand)]
        command: ApiKeysCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// List jobs, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Page size, defaults to the configured page_size
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, value_enum)]
        status: Option<JobStatus>,
    },
    /// Show the status of one job
    Get { job_id: String },
    Delete { job_id: String },
    /// Cancel a pending or processing job
    Cancel { job_id: String },
    /// Follow recent jobs until none are pending or processing
    Watch,
}

#[derive(ClapArgs, Debug)]
pub struct GenerateArgs {
    pub prompt: String,
    /// Generation endpoint
    #[arg(long, default_value = "nano-banana")]
    pub endpoint: String,
    #[arg(long = "type", value_enum, default_value_t = JobType::TextToImage)]
    pub job_type: JobType,
    #[arg(long, default_value = "nano-banana")]
    pub model: String,
    /// Reference image, may be repeated
    #[arg(short, long = "reference")]
    pub references: Vec<PathBuf>,
    /// Extra endpoint option as key=value; values are parsed as JSON when possible
    #[arg(short, long = "param", value_parser = parse_param)]
    pub params: Vec<(String, serde_json::Value)>,
    /// Wait for the job to finish and print its output URL
    #[arg(long)]
    pub wait: bool,
}

#[derive(Subcommand, Debug)]
pub enum TransactionsCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long = "type", value_enum)]
        transaction_type: Option<TransactionType>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ApiKeysCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Create a key; omit --user-id for a standalone key
    Create {
        name: String,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        balance: Option<Decimal>,
    },
    /// Revoke a key by id or prefix
    Revoke { key: String },
    /// Add balance to a key by id or prefix
    TopUp { key: String, amount: Decimal },
}

fn parse_param(raw: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (key, value) = raw.split_once('=').ok_or_else(|| format!("expected key=value, got {raw}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {raw}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub async fn run(command: Command, config: &Config) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    debug!("Using backend at {}", client.base_url());

    match command {
        Command::Jobs { command } => run_jobs(command, client, config).await,
        Command::Generate(args) => run_generate(args, client, config).await,
        Command::Transactions {
            command: TransactionsCommand::List { page, limit, transaction_type },
        } => {
            let filter = TransactionFilter::new(page, limit.unwrap_or(config.page_size)).with_type(transaction_type);
            let listing = Transactions::new(&client).list(&filter).await?;
            for t in &listing.transactions {
                println!(
                    "{}  {:<9}  {:>+6}  balance {:>6}  {}  {}",
                    t.created_at.format("%Y-%m-%d %H:%M"),
                    t.transaction_type.to_string(),
                    t.delta(),
                    t.balance_after,
                    t.job_id.as_deref().unwrap_or("-"),
                    t.reason.as_deref().unwrap_or("")
                );
            }
            print_pagination(listing.pagination.page, listing.pagination.pages, listing.pagination.total);
            Ok(())
        }
        Command::Credits => {
            let credits = Credits::new(&client).balance().await?;
            println!("Balance:        {}", credits.balance);
            println!("Total spent:    {}", credits.total_spent);
            println!("Total refunded: {}", credits.total_refunded);
            Ok(())
        }
        Command::ApiKeys { command } => run_api_keys(command, &client, config).await,
    }
}

async fn run_jobs(command: JobsCommand, client: ApiClient, config: &Config) -> Result<()> {
    let jobs = Jobs::new(&client);
    match command {
        JobsCommand::List { page, limit, status } => {
            let filter = JobFilter::new(page, limit.unwrap_or(config.page_size)).with_status(status);
            let listing = jobs.list(&filter).await?;
            for job in &listing.jobs {
                println!("{}", job_line(job));
            }
            print_pagination(listing.pagination.page, listing.pagination.pages, listing.pagination.total);
        }
        JobsCommand::Get { job_id } => {
            let status = jobs.status(&job_id).await?;
            println!("{job_id}: {}", status.status);
            if let Some(result) = status.result {
                println!("Output: {result}");
            }
            if let Some(error) = status.error {
                println!("Error: {error}");
            }
        }
        JobsCommand::Delete { job_id } => {
            jobs.delete(&job_id).await?;
            println!("Deleted {job_id}");
        }
        JobsCommand::Cancel { job_id } => {
            jobs.cancel(&job_id).await?;
            println!("Cancelled {job_id}");
        }
        JobsCommand::Watch => watch(&client, config).await?,
    }
    Ok(())
}

fn job_line(job: &Job) -> String {
    let detail = match job.status {
        JobStatus::Completed => job.output_url.clone().unwrap_or_default(),
        JobStatus::Failed => job.error_message.clone().unwrap_or_default(),
        _ => String::new(),
    };
    format!(
        "{}  {:<10}  {:<6}  {:<14}  {}  {}",
        job.created_at.format("%Y-%m-%d %H:%M"),
        job.status.as_str(),
        job.job_type.as_str(),
        job.job_id,
        job.model,
        detail
    )
}

fn print_pagination(page: u32, pages: u32, total: u64) {
    println!("Page {page}/{pages} ({total} total)");
}

/// Print each job once, and again whenever its status changes
fn print_changes(jobs: &[Job], seen: &mut HashMap<JobId, JobStatus>) {
    for job in jobs.iter().rev() {
        if seen.insert(job.job_id.clone(), job.status) != Some(job.status) {
            println!("{}", job_line(job));
        }
    }
}

async fn watch(client: &ApiClient, config: &Config) -> Result<()> {
    let (store, _guard) = JobStore::start(Arc::new(client.clone()), StoreSettings::from(config));
    store.refresh_jobs().await?;

    let mut seen = HashMap::new();
    let mut rx = store.subscribe();
    print_changes(&rx.borrow_and_update().merged(), &mut seen);

    while store.has_active_jobs() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let jobs = rx.borrow_and_update().merged();
                print_changes(&jobs, &mut seen);
            }
        }
    }
    println!("No active jobs");
    Ok(())
}

async fn run_generate(args: GenerateArgs, client: ApiClient, config: &Config) -> Result<()> {
    let mut references = Vec::with_capacity(args.references.len());
    for path in &args.references {
        references.push(ReferenceAsset::from_path(path).await?);
    }

    let request = GenerationRequest::builder()
        .endpoint(args.endpoint)
        .job_type(args.job_type)
        .model(args.model)
        .prompt(args.prompt)
        .parameters(args.params.into_iter().collect())
        .references(references)
        .build();

    let settings = StoreSettings::from(config);
    let (store, _guard) = if args.wait {
        let (store, guard) = JobStore::start(Arc::new(client.clone()), settings);
        (store, Some(guard))
    } else {
        (JobStore::new(Arc::new(client.clone()), settings), None)
    };

    let submitter = Submitter::new(&client, &store);
    let submitted = submitter.submit(&request).await?;
    println!("Submitted {}", submitted.job_id);

    if args.wait {
        let job = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                return Err(Error::Cancelled { job_id: submitted.job_id.clone() });
            }
            job = submitter.wait(&submitted) => job?,
        };
        println!("{}", job.output_url.as_deref().unwrap_or("Completed"));
    }
    Ok(())
}

async fn run_api_keys(command: ApiKeysCommand, client: &ApiClient, config: &Config) -> Result<()> {
    let keys = ApiKeys::new(client);
    match command {
        ApiKeysCommand::List { page, limit } => {
            let listing = keys.list(&PageQuery::new(page, limit.unwrap_or(config.page_size))).await?;
            for key in &listing.api_keys {
                println!("{}", key_line(key));
            }
            print_pagination(listing.pagination.page, listing.pagination.pages, listing.pagination.total);
        }
        ApiKeysCommand::Create { name, user_id, balance } => {
            let created = keys
                .create(&ApiKeyCreate {
                    name,
                    user_id,
                    initial_balance: balance,
                })
                .await?;
            println!("{}", key_line(&created.api_key));
            // Shown once, the backend only keeps a hash
            println!("Key: {}", created.key);
        }
        ApiKeysCommand::Revoke { key } => {
            let key = keys.find(&key).await?;
            keys.revoke(&key).await?;
            println!("Revoked {}", key.key_prefix);
        }
        ApiKeysCommand::TopUp { key, amount } => {
            let key = keys.find(&key).await?;
            let updated = keys.top_up(&key, amount).await?;
            println!("{}", key_line(&updated));
        }
    }
    Ok(())
}

fn key_line(key: &ApiKey) -> String {
    format!(
        "{}  {:<12}  {:<20}  {:>10}  {}  {}",
        key.key_id,
        key.key_prefix,
        key.name.as_deref().unwrap_or("-"),
        key.balance,
        key.user_id.as_deref().unwrap_or("standalone"),
        if key.is_active { "active" } else { "revoked" }
    )
}
