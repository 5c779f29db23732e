use crate::{
    api::models::jobs::Pagination,
    types::{ApiKeyId, UserId},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Request models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyCreate {
    pub name: String,
    /// Owner of the key; standalone keys have none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_balance: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyTopUp {
    pub amount: Decimal,
}

// Response models
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKey {
    pub key_id: ApiKeyId,
    pub key_prefix: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    pub fn is_standalone(&self) -> bool {
        self.user_id.is_none()
    }
}

/// Returned once on creation; `key` is the only time the plaintext secret is visible
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyCreated {
    pub key: String,
    pub api_key: ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeysPage {
    pub api_keys: Vec<ApiKey>,
    pub pagination: Pagination,
}
