use serde::{Deserialize, Serialize};

/// Request for a presigned upload slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchUploadRequest {
    pub files: Vec<UploadRequest>,
}

/// Presigned upload slot. The client PUTs the raw bytes to `upload_url`; `url` is where
/// the asset is served from afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadTicket {
    pub id: String,
    pub url: String,
    pub upload_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadCheck {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadCheckResponse {
    pub id: String,
    #[serde(default)]
    pub exists: bool,
}

/// A confirmed reference asset as it is sent along with a generation request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadedReference {
    pub id: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}
