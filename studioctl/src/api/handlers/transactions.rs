use crate::{
    api::{
        client::ApiClient,
        handlers::repository::{Page, PagedResource},
        models::transactions::{Transaction, TransactionFilter, TransactionsPage},
    },
    errors::Result,
};
use async_trait::async_trait;
use tracing::instrument;

/// Credit ledger of the current user. Read-only: entries are created by the backend.
pub struct Transactions<'c> {
    client: &'c ApiClient,
}

impl<'c> Transactions<'c> {
    pub fn new(client: &'c ApiClient) -> Self {
        Self { client }
    }

    /// List transactions, newest first
    #[instrument(skip(self), err)]
    pub async fn list(&self, filter: &TransactionFilter) -> Result<TransactionsPage> {
        self.client.get(&["api", "transactions"], filter).await
    }
}

#[async_trait]
impl PagedResource for Transactions<'_> {
    type Item = Transaction;
    type Filter = TransactionFilter;

    async fn fetch_page(&self, filter: &TransactionFilter) -> Result<Page<Transaction>> {
        let page = self.list(filter).await?;
        Ok(Page {
            items: page.transactions,
            pagination: page.pagination,
        })
    }
}
