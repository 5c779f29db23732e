use crate::{
    api::{
        client::{ApiClient, NO_QUERY},
        models::credits::CreditBalance,
    },
    errors::Result,
};
use tracing::instrument;

pub struct Credits<'c> {
    client: &'c ApiClient,
}

impl<'c> Credits<'c> {
    pub fn new(client: &'c ApiClient) -> Self {
        Self { client }
    }

    /// Current credit balance of the signed-in user
    #[instrument(skip(self), err)]
    pub async fn balance(&self) -> Result<CreditBalance> {
        self.client.get(&["api", "credits", "balance"], NO_QUERY).await
    }
}
