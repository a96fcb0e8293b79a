use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use tracing::instrument;

use crate::document::MetaUpdate;
use crate::error::{AppError, ErrorBody, OkBody};
use crate::extractors::{AppJson, Identity};
use crate::models::problem::PullProblemResponse;
use crate::models::session::{
    CaseView, FileView, ProgramView, PushSessionResponse, SaveMetaRequest, SessionSnapshot,
    StatementView, file_kind,
};
use crate::models::shared::validate_title;
use crate::quota;
use crate::repo::ProblemDoc;
use crate::session::SessionRecord;
use crate::state::AppState;

use super::{open_session_edit, open_session_read, session_edit_guard};

#[utoipa::path(
    get,
    path = "/{sid}",
    tag = "Sessions",
    operation_id = "getSession",
    summary = "Session snapshot",
    description = "Returns the full working copy: meta, role bindings, cases with sizes, \
        programs, statements and files, plus version markers against the canonical problem. \
        Any access tier on the problem may look, including at other users' sessions.",
    params(("sid" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Working copy snapshot", body = SessionSnapshot),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn get_session(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let access = open_session_read(&state, &sid, &identity.user).await?;
    let snapshot = build_snapshot(&state, &access.problem, access.lock.record()).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    put,
    path = "/{sid}/meta",
    tag = "Sessions",
    operation_id = "saveMeta",
    summary = "Save problem meta",
    description = "Replaces alias, title, limits, source, the interactive flag and the four \
        role bindings in one shot. The whole update is validated first; on any bad field \
        nothing changes. Role fields must name registered programs or be empty to unbind.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = SaveMetaRequest,
    responses(
        (status = 200, description = "Meta saved", body = OkBody),
        (status = 400, description = "Invalid meta (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn save_meta(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<SaveMetaRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    validate_title(&payload.title)?;

    let update = MetaUpdate {
        alias: payload.alias,
        title: payload.title.trim().to_string(),
        time_limit_ms: payload.time_limit_ms,
        memory_limit_mb: payload.memory_limit_mb,
        source: payload.source,
        interactive: payload.interactive,
        checker: payload.checker,
        interactor: payload.interactor,
        validator: payload.validator,
        model: payload.model,
    };
    access
        .lock
        .content_mut()
        .update_meta(update)
        .map_err(AppError::Validation)?;
    access.lock.commit().await?;

    Ok(Json(OkBody::ok()))
}

#[utoipa::path(
    post,
    path = "/{sid}/pull",
    tag = "Sessions",
    operation_id = "pullSession",
    summary = "Reset the session to the canonical problem",
    description = "Discards the working copy and rebuilds it from the current canonical \
        content. This is how a stale session catches up after someone else pushed.",
    params(("sid" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session reset", body = PullProblemResponse),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn pull_session(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (problem, _) = session_edit_guard(&state, &sid, &identity.user).await?;
    let record = state.sessions.pull_or_init(&problem, &identity.user).await?;
    tracing::info!(problem = problem.id, "session reset to canonical");

    Ok(Json(PullProblemResponse {
        session_id: record.id,
        base_version: record.base_version,
    }))
}

#[utoipa::path(
    post,
    path = "/{sid}/push",
    tag = "Sessions",
    operation_id = "pushSession",
    summary = "Publish the working copy",
    description = "Publishes the working copy as the new canonical content. Role bindings \
        are re-checked first. The push succeeds only if nobody else published since this \
        session last pulled; on a conflict, pull and redo.",
    params(("sid" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Published", body = PushSessionResponse),
        (status = 400, description = "Dangling role binding (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Canonical moved since pull (CONFLICT)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn push_session(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    access
        .lock
        .content()
        .validate_roles()
        .map_err(AppError::Validation)?;

    let content = access.lock.content().clone();
    let version = state
        .problems
        .publish(access.problem.id, access.lock.record().base_version, content)
        .await?;
    access.lock.set_base_version(version);
    access.lock.commit().await?;

    tracing::info!(problem = access.problem.id, version, "session pushed");
    Ok(Json(PushSessionResponse { version }))
}

/// Assemble the snapshot read-model: document state joined with blob
/// sizes, role bindings and version markers.
async fn build_snapshot(
    state: &AppState,
    problem: &ProblemDoc,
    record: &SessionRecord,
) -> Result<SessionSnapshot, AppError> {
    let content = &record.content;
    let blobs = state.blobs.as_ref();

    let mut cases = Vec::with_capacity(content.cases.len());
    for (fingerprint, entry) in &content.cases {
        let input_size = quota::blob_size(blobs, &entry.input).await?;
        let output_size = match entry.output {
            Some(hash) => Some(quota::blob_size(blobs, &hash).await?),
            None => None,
        };
        cases.push(CaseView {
            fingerprint: fingerprint.to_hex(),
            order: entry.order,
            used: entry.used(),
            point: entry.point,
            pretest: entry.pretest,
            sample: entry.sample,
            well_form: entry.well_form,
            input_size,
            output_size,
        });
    }
    // Judge order first, parked cases after (stable, so those keep
    // fingerprint order).
    cases.sort_by_key(|c| (!c.used, c.order));

    let programs = content
        .programs
        .iter()
        .map(|(filename, entry)| ProgramView {
            filename: filename.clone(),
            category: entry.category,
            language: entry.language.clone(),
            used: content.role_of(filename).map(String::from),
            size: entry.code.len() as u64,
        })
        .collect();

    let statements = content
        .statements
        .iter()
        .map(|(filename, text)| StatementView {
            filename: filename.clone(),
            size: text.len() as u64,
        })
        .collect();

    let mut files = Vec::with_capacity(content.files.len());
    for (filename, hash) in &content.files {
        files.push(FileView {
            filename: filename.clone(),
            url: format!("/api/v1/sessions/{}/files/{}", record.id, filename),
            kind: file_kind(filename),
            size: quota::blob_size(blobs, hash).await?,
        });
    }

    Ok(SessionSnapshot {
        id: record.id.clone(),
        problem_id: record.problem_id,
        user: record.user.clone(),
        version: record.version,
        base_version: record.base_version,
        canonical_version: problem.version,
        updated_at: record.updated_at,

        alias: content.alias.clone(),
        title: content.title.clone(),
        time_limit_ms: content.time_limit_ms,
        memory_limit_mb: content.memory_limit_mb,
        source: content.source.clone(),
        interactive: content.interactive,
        checker: content.checker.clone(),
        interactor: content.interactor.clone(),
        validator: content.validator.clone(),
        model: content.model.clone(),

        case_count: content.case_count(),
        pretest_count: content.pretest_count(),
        sample_count: content.sample_count(),
        volume_used: quota::volume_used(blobs, content).await?,
        volume_quota: state.config.storage.problem_quota,

        cases,
        programs,
        statements,
        files,
    })
}
