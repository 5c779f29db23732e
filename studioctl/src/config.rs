use crate::{
    commands::Command,
    errors::{Error, Result},
};
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;
use url::Url;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "studioctl", version, about = "Manage generation jobs, credits and API keys")]
pub struct Args {
    /// Path to the YAML configuration file
    #[arg(short = 'f', long, env = "STUDIOCTL_CONFIG", default_value = "studioctl.yaml")]
    pub config: PathBuf,

    /// Backend base URL, overrides the configuration file
    #[arg(long)]
    pub base_url: Option<Url>,

    /// Access token, overrides the configuration file and the token file
    #[arg(long, hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Backend base URL, e.g. https://studio.example.com
    pub base_url: Url,
    /// Access token sent as a bearer token
    pub token: Option<String>,
    /// File holding the access token, read when `token` is unset
    pub token_file: Option<PathBuf>,
    /// How often active jobs are re-fetched
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Delay before the follow-up refresh once a submitted job has its real id
    #[serde(with = "humantime_serde")]
    pub refresh_delay: Duration,
    /// Per-request timeout, none by default
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    /// Number of recent jobs the job store keeps
    pub page_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8000").expect("static URL is valid"),
            token: None,
            token_file: None,
            poll_interval: Duration::from_secs(3),
            refresh_delay: Duration::from_secs(1),
            request_timeout: None,
            page_size: 20,
        }
    }
}

/// Values given on the command line, layered on top of file and environment
#[derive(Serialize)]
struct CliOverrides<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<&'a Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

impl Config {
    /// Load configuration: defaults, then the YAML file, then `STUDIOCTL_*` env vars, then CLI flags
    pub fn load(args: &Args) -> Result<Self> {
        let config: Config = Self::figment(&args.config)
            .merge(Serialized::defaults(CliOverrides {
                base_url: args.base_url.as_ref(),
                token: args.token.as_deref(),
            }))
            .extract()?;

        config.validate()?;
        debug!("Loaded configuration from {}", args.config.display());
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("STUDIOCTL_").ignore(&["config"]))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.page_size) {
            return Err(Error::Config(format!("page_size must be between 1 and 100, got {}", self.page_size)));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll_interval must be greater than zero".to_string()));
        }
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!("base_url must be http or https, got {}", self.base_url)));
        }
        Ok(())
    }

    /// The access token: inline value first, then the token file. Blank values count as unset.
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if let Some(token) = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(Some(token.to_string()));
        }

        let Some(path) = &self.token_file else {
            return Ok(None);
        };
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read token file {}: {e}", path.display())))?;
        let token = contents.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }
}
