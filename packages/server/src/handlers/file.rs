use std::path::PathBuf;

use axum::Json;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::storage::BoxReader;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody, OkBody};
use crate::extractors::Identity;
use crate::models::file::{StoredFile, UploadFilesResponse};
use crate::quota;
use crate::state::AppState;
use crate::utils::filename::{random_upload_name, validate_flat_filename};

use super::{open_session_edit, open_session_read, session_edit_guard};

/// An uploaded field parked on disk until the quota check passes.
struct StagedUpload {
    original: String,
    temp_path: PathBuf,
    size: u64,
}

#[utoipa::path(
    post,
    path = "/{sid}/files",
    tag = "Files",
    operation_id = "uploadFiles",
    summary = "Upload support files",
    description = "Multipart upload of one or more `file` fields, e.g. statement images. \
        Each file is stored under a fresh random name (original extension kept) so uploads \
        never clash; the response maps original names to stored ones.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Files stored", body = UploadFilesResponse),
        (status = 400, description = "Bad filename or quota exceeded (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, multipart), fields(user = %identity.user, sid = %sid))]
pub async fn upload_files(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    // Check permissions before consuming the body.
    session_edit_guard(&state, &sid, &identity.user).await?;

    let mut staged: Vec<StagedUpload> = Vec::new();
    let result = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Multipart read error: {e}")))?
        {
            if field.name() != Some("file") {
                continue;
            }
            let original = field
                .file_name()
                .map(|s| s.to_string())
                .ok_or_else(|| AppError::Validation("File field must carry a filename".into()))?;
            let original = validate_flat_filename(&original)
                .map_err(|e| AppError::Validation(e.message().into()))?
                .to_string();

            let (temp_path, size) =
                stream_field_to_temp(field, state.config.storage.max_blob_size).await?;
            staged.push(StagedUpload {
                original,
                temp_path,
                size,
            });
        }
        if staged.is_empty() {
            return Err(AppError::Validation("Missing 'file' field".into()));
        }

        let mut access = open_session_edit(&state, &sid, &identity.user).await?;
        let incoming: u64 = staged.iter().map(|s| s.size).sum();
        quota::ensure_capacity(
            state.blobs.as_ref(),
            access.lock.content(),
            incoming,
            state.config.storage.problem_quota,
        )
        .await?;

        let mut files = Vec::with_capacity(staged.len());
        for upload in &staged {
            let file = tokio::fs::File::open(&upload.temp_path)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to reopen temp file: {e}")))?;
            let reader: BoxReader = Box::new(file);
            let hash = state.blobs.put_stream(reader).await?;

            let filename = random_upload_name(&upload.original);
            access
                .lock
                .content_mut()
                .files
                .insert(filename.clone(), hash);
            files.push(StoredFile {
                original: upload.original.clone(),
                filename,
                size: upload.size,
            });
        }
        access.lock.commit().await?;
        Ok(files)
    }
    .await;

    // Best effort.
    for upload in &staged {
        let _ = tokio::fs::remove_file(&upload.temp_path).await;
    }

    let files = result?;
    tracing::info!(count = files.len(), "files uploaded");
    Ok((StatusCode::CREATED, Json(UploadFilesResponse { files })))
}

#[utoipa::path(
    get,
    path = "/{sid}/files/{filename}",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download a support file",
    description = "Serves the file inline with its guessed content type, so statement \
        images render in the browser. Supports `If-None-Match` revalidation.",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("filename" = String, Path, description = "Stored filename"),
    ),
    responses(
        (status = 200, description = "File data"),
        (status = 304, description = "Not modified"),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or file not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, headers), fields(user = %identity.user, sid = %sid))]
pub async fn download_file(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let access = open_session_read(&state, &sid, &identity.user).await?;
    let hash = access
        .lock
        .content()
        .files
        .get(&filename)
        .copied()
        .ok_or_else(|| AppError::NotFound(format!("File {filename} not found")))?;

    let etag = format!("\"{hash}\"");
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let size = state.blobs.size(&hash).await?;
    let reader = state.blobs.get_stream(&hash).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    let content_type = mime_guess::from_path(&filename).first_or_octet_stream();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&filename),
        )
        .header(header::ETAG, &etag)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

#[utoipa::path(
    delete,
    path = "/{sid}/files/{filename}",
    tag = "Files",
    operation_id = "deleteFile",
    summary = "Remove a support file",
    description = "Drops the file entry from the session; the blob itself stays in shared \
        storage. Removing an absent file is not an error.",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("filename" = String, Path, description = "Stored filename"),
    ),
    responses(
        (status = 200, description = "File gone", body = OkBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn delete_file(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    if access.lock.content_mut().files.remove(&filename).is_some() {
        access.lock.commit().await?;
    }
    Ok(Json(OkBody::ok()))
}

/// Build a safe inline `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("inline; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}

/// Stream a multipart field to a temp file, enforcing the per-file cap.
async fn stream_field_to_temp(
    mut field: axum::extract::multipart::Field<'_>,
    max_size: u64,
) -> Result<(PathBuf, u64), AppError> {
    let temp_path = std::env::temp_dir().join(format!("polygon-upload-{}", Uuid::new_v4()));

    let result = async {
        let mut temp_file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;

        let mut total: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?
        {
            total += chunk.len() as u64;
            if total > max_size {
                return Err(AppError::Validation(format!(
                    "File exceeds maximum size of {max_size} bytes"
                )));
            }
            temp_file
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::Internal(format!("Temp file write failed: {e}")))?;
        }

        temp_file
            .flush()
            .await
            .map_err(|e| AppError::Internal(format!("Temp file flush failed: {e}")))?;
        Ok(total)
    }
    .await;

    match result {
        Ok(size) => Ok((temp_path, size)),
        Err(e) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            Err(e)
        }
    }
}

/// Body limit for file uploads (128MB).
pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(128 * 1024 * 1024)
}
