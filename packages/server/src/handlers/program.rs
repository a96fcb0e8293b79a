use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::instrument;

use crate::builtins::{self, BuiltinBrief};
use crate::document::ProgramEntry;
use crate::error::{AppError, ErrorBody, OkBody};
use crate::extractors::{AppJson, Identity};
use crate::models::program::{
    CreateProgramRequest, ImportProgramRequest, ProgramSourceResponse, UpdateProgramRequest,
    validate_program_fields,
};
use crate::models::session::ProgramView;
use crate::state::AppState;

use super::{open_session_edit, open_session_read};

#[utoipa::path(
    post,
    path = "/{sid}/programs",
    tag = "Programs",
    operation_id = "createProgram",
    summary = "Register a program",
    description = "Adds a source file to the session under one of the six categories. The \
        filename must be new; use the update endpoint to replace code.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = CreateProgramRequest,
    responses(
        (status = 201, description = "Program registered", body = ProgramView),
        (status = 400, description = "Bad fields or duplicate filename (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn create_program(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<CreateProgramRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_program_fields(&payload.filename, &payload.language, &payload.code)?;
    let filename = payload.filename.trim().to_string();
    let language = payload.language.trim().to_string();

    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    let entry = ProgramEntry {
        category: payload.category,
        language: language.clone(),
        code: payload.code,
    };
    let size = entry.code.len() as u64;
    access
        .lock
        .content_mut()
        .create_program(filename.clone(), entry)
        .map_err(AppError::Validation)?;
    access.lock.commit().await?;

    let used = access.lock.content().role_of(&filename).map(String::from);
    Ok((
        StatusCode::CREATED,
        Json(ProgramView {
            filename,
            category: payload.category,
            language,
            used,
            size,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/{sid}/programs",
    tag = "Programs",
    operation_id = "updateProgram",
    summary = "Replace or rename a program",
    description = "Replaces the entry registered as `raw_filename`, optionally under a new \
        name. Role bindings are not rewritten on rename; a binding still pointing at the old \
        name must be fixed in a meta save before the session can push.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = UpdateProgramRequest,
    responses(
        (status = 200, description = "Program replaced", body = ProgramView),
        (status = 400, description = "Bad fields or name collision (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or program not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn update_program(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<UpdateProgramRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_program_fields(&payload.filename, &payload.language, &payload.code)?;
    let filename = payload.filename.trim().to_string();
    let language = payload.language.trim().to_string();

    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    if !access
        .lock
        .content()
        .programs
        .contains_key(&payload.raw_filename)
    {
        return Err(AppError::NotFound(format!(
            "Program file {} not found",
            payload.raw_filename
        )));
    }

    let entry = ProgramEntry {
        category: payload.category,
        language: language.clone(),
        code: payload.code,
    };
    let size = entry.code.len() as u64;
    access
        .lock
        .content_mut()
        .replace_program(&payload.raw_filename, filename.clone(), entry)
        .map_err(AppError::Validation)?;
    access.lock.commit().await?;

    let used = access.lock.content().role_of(&filename).map(String::from);
    Ok(Json(ProgramView {
        filename,
        category: payload.category,
        language,
        used,
        size,
    }))
}

#[utoipa::path(
    get,
    path = "/{sid}/programs/{filename}",
    tag = "Programs",
    operation_id = "getProgram",
    summary = "Read a program's source",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("filename" = String, Path, description = "Program filename"),
    ),
    responses(
        (status = 200, description = "Program source", body = ProgramSourceResponse),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or program not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn get_program(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let access = open_session_read(&state, &sid, &identity.user).await?;
    let entry = access
        .lock
        .content()
        .programs
        .get(&filename)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Program file {filename} not found")))?;

    Ok(Json(ProgramSourceResponse {
        filename,
        category: entry.category,
        language: entry.language,
        code: entry.code,
    }))
}

#[utoipa::path(
    delete,
    path = "/{sid}/programs/{filename}",
    tag = "Programs",
    operation_id = "deleteProgram",
    summary = "Remove a program",
    description = "Removing an absent program is not an error. A role bound to the removed \
        program dangles until the next meta save; pushing is blocked until then.",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("filename" = String, Path, description = "Program filename"),
    ),
    responses(
        (status = 200, description = "Program gone", body = OkBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn delete_program(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, filename)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    if access.lock.content_mut().remove_program(&filename) {
        access.lock.commit().await?;
    }
    Ok(Json(OkBody::ok()))
}

#[utoipa::path(
    post,
    path = "/{sid}/programs/import",
    tag = "Programs",
    operation_id = "importBuiltin",
    summary = "Import a builtin template",
    description = "Copies a builtin template into the session's program map under the \
        template's filename, overwriting any existing entry of that name.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = ImportProgramRequest,
    responses(
        (status = 200, description = "Template imported", body = ProgramView),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or template not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn import_builtin(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<ImportProgramRequest>,
) -> Result<impl IntoResponse, AppError> {
    let requested = payload.filename.trim();
    let builtin = builtins::find_builtin(requested)
        .ok_or_else(|| AppError::NotFound(format!("Builtin {requested} not found")))?;

    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    access
        .lock
        .content_mut()
        .import_program(builtin.filename.to_string(), builtin.entry());
    access.lock.commit().await?;

    let used = access
        .lock
        .content()
        .role_of(builtin.filename)
        .map(String::from);
    Ok(Json(ProgramView {
        filename: builtin.filename.to_string(),
        category: builtin.category,
        language: builtin.language.to_string(),
        used,
        size: builtin.code.len() as u64,
    }))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Programs",
    operation_id = "listBuiltins",
    summary = "List builtin templates",
    responses(
        (status = 200, description = "Available templates", body = [BuiltinBrief]),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
pub async fn list_builtins(_identity: Identity) -> Json<Vec<BuiltinBrief>> {
    Json(builtins::list_builtins())
}
