use crate::{
    api::{
        client::ApiClient,
        models::uploads::{BatchUploadRequest, UploadCheck, UploadCheckResponse, UploadRequest, UploadTicket},
    },
    errors::{Error, Result},
};
use tracing::instrument;

/// Presigned reference uploads for a generation endpoint (e.g. `nano-banana`, `sora`)
pub struct Uploads<'c> {
    client: &'c ApiClient,
    endpoint: &'c str,
}

impl<'c> Uploads<'c> {
    pub fn new(client: &'c ApiClient, endpoint: &'c str) -> Self {
        Self { client, endpoint }
    }

    fn path<'a>(&'a self, action: &'a str) -> [&'a str; 4] {
        ["api", self.endpoint, "upload", action]
    }

    /// Request one upload slot
    #[instrument(skip(self), fields(endpoint = self.endpoint), err)]
    pub async fn reference(&self, file_name: &str, content_type: &str) -> Result<UploadTicket> {
        let request = UploadRequest {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
        };
        self.client.post(&self.path("reference"), &request).await
    }

    /// Request several upload slots at once; tickets come back in request order
    #[instrument(skip(self, files), fields(endpoint = self.endpoint, count = files.len()), err)]
    pub async fn batch(&self, files: Vec<UploadRequest>) -> Result<Vec<UploadTicket>> {
        let expected = files.len();
        let tickets: Vec<UploadTicket> = self.client.post(&self.path("batch"), &BatchUploadRequest { files }).await?;
        if tickets.len() != expected {
            return Err(Error::BadRequest {
                message: format!("Requested {expected} upload slots but received {}", tickets.len()),
            });
        }
        Ok(tickets)
    }

    /// Confirm the backend has received the bytes for an upload slot
    #[instrument(skip(self), fields(endpoint = self.endpoint), err)]
    pub async fn check(&self, id: &str) -> Result<()> {
        let response: UploadCheckResponse = self.client.post(&self.path("check"), &UploadCheck { id: id.to_string() }).await?;
        if !response.exists {
            return Err(Error::BadRequest {
                message: format!("Upload {id} was not received by the backend"),
            });
        }
        Ok(())
    }
}
