//! Storage accounting for problem data.
//!
//! The volume a problem occupies is the summed size of every distinct
//! blob its document references. Deduplicated data is therefore counted
//! once no matter how many cases share it.

use common::storage::{BlobStore, ContentHash, StorageError};

use crate::document::ProblemContent;
use crate::error::AppError;

/// Size of one blob, treating a missing blob as zero bytes.
pub async fn blob_size(blobs: &dyn BlobStore, hash: &ContentHash) -> Result<u64, StorageError> {
    match blobs.size(hash).await {
        Ok(size) => Ok(size),
        Err(e) if e.is_not_found() => Ok(0),
        Err(e) => Err(e),
    }
}

/// Bytes of blob storage the document currently references.
///
/// References whose blob has gone missing count as zero.
pub async fn volume_used(
    blobs: &dyn BlobStore,
    content: &ProblemContent,
) -> Result<u64, StorageError> {
    let mut total = 0u64;
    for hash in content.referenced_blobs() {
        total += blob_size(blobs, &hash).await?;
    }
    Ok(total)
}

/// Reject the write if `incoming` more bytes would break the quota.
pub async fn ensure_capacity(
    blobs: &dyn BlobStore,
    content: &ProblemContent,
    incoming: u64,
    quota: u64,
) -> Result<(), AppError> {
    let used = volume_used(blobs, content).await?;
    if used.saturating_add(incoming) > quota {
        return Err(AppError::Validation(format!(
            "Storage quota exceeded ({used} of {quota} bytes used, {incoming} more requested)"
        )));
    }
    Ok(())
}
