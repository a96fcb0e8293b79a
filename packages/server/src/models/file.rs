use serde::Serialize;
use utoipa::ToSchema;

/// One uploaded file after renaming.
#[derive(Serialize, ToSchema)]
pub struct StoredFile {
    /// Name the client sent.
    pub original: String,
    /// Random name the file is stored under (extension kept).
    pub filename: String,
    pub size: u64,
}

#[derive(Serialize, ToSchema)]
pub struct UploadFilesResponse {
    pub files: Vec<StoredFile>,
}
