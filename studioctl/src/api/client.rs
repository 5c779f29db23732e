use crate::{
    config::Config,
    errors::{Error, Result},
};
use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, RequestBuilder, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, trace};
use url::Url;

/// Empty query string for GETs without parameters
pub(crate) const NO_QUERY: &[(&str, &str)] = &[];

/// Error body the backend sends with non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
    message: Option<String>,
}

/// Authenticated JSON client for the studio backend.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: Url, token: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(concat!("studioctl/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self { http, base_url, token })
    }

    /// Build a client from configuration, reading the token from the token file when no inline token is set
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config.resolve_token()?;
        if token.is_none() {
            debug!("No access token configured, requests will be unauthenticated");
        }
        Self::new(config.base_url.clone(), token, config.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Headers attached to every backend request
    pub fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Access token contains invalid header characters, sending without it"),
            }
        }
        headers
    }

    /// Append path segments to the base URL. Each segment is percent-encoded, so ids
    /// containing `/`, `?` or `#` stay a single segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    #[instrument(skip(self, query), err)]
    pub(crate) async fn get<Q, T>(&self, segments: &[&str], query: &Q) -> Result<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.get(self.url(segments)?).headers(self.auth_headers()).query(query);
        let response = self.send(request, segments).await?;
        decode(response, segments).await
    }

    #[instrument(skip(self, body), err)]
    pub(crate) async fn post<B, T>(&self, segments: &[&str], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.url(segments)?).headers(self.auth_headers()).json(body);
        let response = self.send(request, segments).await?;
        decode(response, segments).await
    }

    /// POST without a body, for action endpoints whose response body is not needed
    #[instrument(skip(self), err)]
    pub(crate) async fn post_action(&self, segments: &[&str]) -> Result<()> {
        let request = self.http.post(self.url(segments)?).headers(self.auth_headers());
        self.send(request, segments).await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    pub(crate) async fn delete(&self, segments: &[&str]) -> Result<()> {
        let request = self.http.delete(self.url(segments)?).headers(self.auth_headers());
        self.send(request, segments).await?;
        Ok(())
    }

    /// Raw PUT of file bytes to a presigned upload URL. The bearer token is not sent to storage.
    #[instrument(skip(self, bytes), fields(size = bytes.len()), err)]
    pub async fn put_upload(&self, upload_url: &str, bytes: Bytes, content_type: &str) -> Result<()> {
        let response = self
            .http
            .put(upload_url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upload { status, body });
        }

        debug!("Uploaded reference asset");
        Ok(())
    }

    async fn send(&self, request: RequestBuilder, segments: &[&str]) -> Result<Response> {
        let path = segments.join("/");
        trace!("Sending request to /{path}");
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!("Request to /{path} failed with {status}: {body}");
        Err(error_from_status(status, segments, &body))
    }
}

async fn decode<T: DeserializeOwned>(response: Response, segments: &[&str]) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|source| Error::Decode {
        endpoint: format!("/{}", segments.join("/")),
        source,
    })
}

/// Map a non-2xx response onto the error taxonomy, preferring the backend's `detail`
fn error_from_status(status: StatusCode, segments: &[&str], body: &str) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized,
        StatusCode::NOT_FOUND => Error::NotFound {
            resource: resource_name(segments),
            id: segments.last().copied().unwrap_or_default().to_string(),
        },
        _ => Error::Http {
            status,
            message: error_message(status, body),
        },
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        match parsed.detail {
            Some(serde_json::Value::String(detail)) => return detail,
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
        if let Some(message) = parsed.message {
            return message;
        }
    }

    if !body.trim().is_empty() {
        return body.trim().to_string();
    }

    status.canonical_reason().unwrap_or("Request failed").to_string()
}

/// ["api", "jobs", "abc"] -> "jobs", used to label not-found errors
fn resource_name(segments: &[&str]) -> String {
    segments
        .iter()
        .copied()
        .skip_while(|s| *s == "api")
        .find(|s| !s.is_empty())
        .unwrap_or("resource")
        .to_string()
}
