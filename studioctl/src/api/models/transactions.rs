use crate::{
    api::models::jobs::Pagination,
    types::{TransactionId, UserId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Credit ledger entry type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deduct,
    Refund,
    Initial,
    AdminAdd,
}

impl TransactionType {
    /// Whether the entry increases the balance
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionType::Deduct)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Deduct => "deduct",
            TransactionType::Refund => "refund",
            TransactionType::Initial => "initial",
            TransactionType::AdminAdd => "admin_add",
        };
        f.write_str(s)
    }
}

// Response models
/// Immutable record of a credit balance change, created only by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Absolute number of credits moved
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    #[serde(default)]
    pub reason: Option<String>,
    /// Job that caused a deduct or refund
    #[serde(default)]
    pub job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Signed change in balance
    pub fn delta(&self) -> i64 {
        self.balance_after - self.balance_before
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionsPage {
    pub transactions: Vec<Transaction>,
    pub pagination: Pagination,
}

/// Query parameters for listing transactions
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionFilter {
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
}

impl TransactionFilter {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
            transaction_type: None,
        }
    }

    pub fn with_type(mut self, transaction_type: Option<TransactionType>) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    pub fn clamped(mut self, pagination: &Pagination) -> Self {
        self.page = pagination.clamp_page(i64::from(self.page));
        self
    }
}
