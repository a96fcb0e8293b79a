use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::error::{AppError, ErrorBody, OkBody};
use crate::extractors::{AppJson, Identity};
use crate::models::statement::{CreateStatementRequest, StatementResponse, UpdateStatementRequest};
use crate::state::AppState;
use crate::utils::filename::validate_flat_filename;

use super::{open_session_edit, open_session_read};

#[utoipa::path(
    post,
    path = "/{sid}/statements",
    tag = "Statements",
    operation_id = "createStatement",
    summary = "Create an empty statement",
    description = "Registers a statement file in the session. Several statements may \
        coexist, e.g. one per language.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = CreateStatementRequest,
    responses(
        (status = 201, description = "Statement created", body = StatementResponse),
        (status = 400, description = "Bad or duplicate filename (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn create_statement(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<CreateStatementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let filename = validate_flat_filename(&payload.filename)
        .map_err(|e| AppError::Validation(e.message().into()))?
        .to_string();

    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    if access.lock.content().statements.contains_key(&filename) {
        return Err(AppError::Validation(format!(
            "Statement {filename} already exists"
        )));
    }
    access
        .lock
        .content_mut()
        .statements
        .insert(filename.clone(), String::new());
    access.lock.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(StatementResponse {
            filename,
            text: String::new(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/{sid}/statements/{filename}",
    tag = "Statements",
    operation_id = "getStatement",
    summary = "Read a statement",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("filename" = String, Path, description = "Statement filename"),
    ),
    responses(
        (status = 200, description = "Statement text", body = StatementResponse),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or statement not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn get_statement(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let access = open_session_read(&state, &sid, &identity.user).await?;
    let text = access
        .lock
        .content()
        .statements
        .get(&filename)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Statement {filename} not found")))?;

    Ok(Json(StatementResponse { filename, text }))
}

#[utoipa::path(
    put,
    path = "/{sid}/statements/{filename}",
    tag = "Statements",
    operation_id = "updateStatement",
    summary = "Replace a statement's text",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("filename" = String, Path, description = "Statement filename"),
    ),
    request_body = UpdateStatementRequest,
    responses(
        (status = 200, description = "Statement saved", body = OkBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or statement not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn update_statement(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, filename)): Path<(String, String)>,
    AppJson(payload): AppJson<UpdateStatementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    if !access.lock.content().statements.contains_key(&filename) {
        return Err(AppError::NotFound(format!(
            "Statement {filename} not found"
        )));
    }
    access
        .lock
        .content_mut()
        .statements
        .insert(filename, payload.text);
    access.lock.commit().await?;

    Ok(Json(OkBody::ok()))
}

#[utoipa::path(
    delete,
    path = "/{sid}/statements/{filename}",
    tag = "Statements",
    operation_id = "deleteStatement",
    summary = "Delete a statement",
    description = "Removing a statement that is already gone is not an error.",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("filename" = String, Path, description = "Statement filename"),
    ),
    responses(
        (status = 200, description = "Statement gone", body = OkBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn delete_statement(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    if access
        .lock
        .content_mut()
        .statements
        .remove(&filename)
        .is_some()
    {
        access.lock.commit().await?;
    }
    Ok(Json(OkBody::ok()))
}
