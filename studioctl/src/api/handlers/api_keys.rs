use crate::{
    api::{
        client::ApiClient,
        handlers::repository::{Page, PageQuery, PagedResource},
        models::api_keys::{ApiKey, ApiKeyCreate, ApiKeyCreated, ApiKeyTopUp, ApiKeysPage},
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{info, instrument};

const API_KEYS_PATH: [&str; 3] = ["api", "admin", "api-keys"];

/// Admin management of API keys, both user-owned and standalone
pub struct ApiKeys<'c> {
    client: &'c ApiClient,
}

impl<'c> ApiKeys<'c> {
    pub fn new(client: &'c ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&self, query: &PageQuery) -> Result<ApiKeysPage> {
        self.client.get(&API_KEYS_PATH, query).await
    }

    #[instrument(skip(self), err)]
    pub async fn create(&self, request: &ApiKeyCreate) -> Result<ApiKeyCreated> {
        if request.name.trim().is_empty() {
            return Err(Error::BadRequest {
                message: "API key name must not be empty".to_string(),
            });
        }
        if request.initial_balance.is_some_and(|b| b < Decimal::ZERO) {
            return Err(Error::BadRequest {
                message: "Initial balance must not be negative".to_string(),
            });
        }

        let created: ApiKeyCreated = self.client.post(&API_KEYS_PATH, request).await?;
        info!("Created API key {} ({})", created.api_key.key_id, created.api_key.key_prefix);
        Ok(created)
    }

    /// Revoke a key. Revocation is one-way, so an already revoked key is rejected without a request.
    #[instrument(skip(self, key), fields(key_id = %key.key_id), err)]
    pub async fn revoke(&self, key: &ApiKey) -> Result<()> {
        ensure_active(key)?;
        self.client.post_action(&key_path(&key.key_id, "revoke")).await?;
        info!("Revoked API key {}", key.key_id);
        Ok(())
    }

    /// Add balance to an active key. Returns the updated key.
    #[instrument(skip(self, key), fields(key_id = %key.key_id), err)]
    pub async fn top_up(&self, key: &ApiKey, amount: Decimal) -> Result<ApiKey> {
        if amount <= Decimal::ZERO {
            return Err(Error::BadRequest {
                message: "Amount must be greater than zero".to_string(),
            });
        }
        ensure_active(key)?;

        self.client
            .post(&key_path(&key.key_id, "top-up"), &ApiKeyTopUp { amount })
            .await
    }

    /// Look a key up by id or by its visible prefix, scanning pages of the listing
    pub async fn find(&self, id_or_prefix: &str) -> Result<ApiKey> {
        let mut query = PageQuery::new(1, 100);
        loop {
            let page = self.list(&query).await?;
            if let Some(key) = page
                .api_keys
                .into_iter()
                .find(|k| k.key_id == id_or_prefix || k.key_prefix == id_or_prefix)
            {
                return Ok(key);
            }
            if !page.pagination.has_next() {
                return Err(Error::NotFound {
                    resource: "API key".to_string(),
                    id: id_or_prefix.to_string(),
                });
            }
            query.page += 1;
        }
    }
}

fn key_path<'a>(key_id: &'a str, action: &'a str) -> [&'a str; 5] {
    let [api, admin, keys] = API_KEYS_PATH;
    [api, admin, keys, key_id, action]
}

fn ensure_active(key: &ApiKey) -> Result<()> {
    if key.is_active {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: format!("API key {} has been revoked", key.key_id),
        })
    }
}

#[async_trait]
impl PagedResource for ApiKeys<'_> {
    type Item = ApiKey;
    type Filter = PageQuery;

    async fn fetch_page(&self, filter: &PageQuery) -> Result<Page<ApiKey>> {
        let page = self.list(filter).await?;
        Ok(Page {
            items: page.api_keys,
            pagination: page.pagination,
        })
    }
}
