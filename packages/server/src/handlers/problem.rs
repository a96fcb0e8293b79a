use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::instrument;

use crate::access::{self, AccessTier};
use crate::document::validate_alias;
use crate::error::{AppError, ErrorBody, OkBody};
use crate::extractors::{AppJson, Identity};
use crate::models::problem::{
    AccessResponse, CreateProblemRequest, CreateProblemResponse, PageQuery, ProblemListItem,
    ProblemListResponse, PullProblemResponse, UpdateAccessRequest, validate_update_access,
};
use crate::models::shared::paginate;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/",
    tag = "Problems",
    operation_id = "createProblem",
    summary = "Create a problem",
    description = "Creates a problem with the given alias and a default title. The caller \
        becomes its admin and gets an edit session immediately.",
    request_body = CreateProblemRequest,
    responses(
        (status = 201, description = "Problem created", body = CreateProblemResponse),
        (status = 400, description = "Bad alias (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user))]
pub async fn create_problem(
    identity: Identity,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateProblemRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_alias(&payload.alias).map_err(AppError::Validation)?;

    let problem = state
        .problems
        .create(payload.alias, identity.user.clone())
        .await?;
    let session = state
        .sessions
        .pull_or_init(&problem, &identity.user)
        .await?;

    tracing::info!(problem = problem.id, session = %session.id, "problem created");
    Ok((
        StatusCode::CREATED,
        Json(CreateProblemResponse {
            id: problem.id,
            alias: problem.content.alias,
            title: problem.content.title,
            session_id: session.id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Problems",
    operation_id = "listProblems",
    summary = "List the caller's problems",
    description = "Returns every problem the caller has an access record for, newest first, \
        with their tier and the open edit sessions.",
    params(PageQuery),
    responses(
        (status = 200, description = "Problem list", body = ProblemListResponse),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, query), fields(user = %identity.user))]
pub async fn list_problems(
    identity: Identity,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let docs = state.problems.list_for_user(&identity.user).await?;

    let items: Vec<ProblemListItem> = docs
        .into_iter()
        .filter_map(|doc| {
            let access = doc.managers.get(&identity.user).copied()?;
            Some(ProblemListItem {
                id: doc.id,
                alias: doc.content.alias,
                title: doc.content.title,
                version: doc.version,
                access,
                updated_at: doc.updated_at,
                sessions: state.sessions.sessions_of(doc.id),
            })
        })
        .collect();

    let (data, pagination) = paginate(items, &query);
    Ok(Json(ProblemListResponse { data, pagination }))
}

#[utoipa::path(
    post,
    path = "/{id}/pull",
    tag = "Problems",
    operation_id = "pullProblem",
    summary = "Open or refresh the caller's edit session",
    description = "Creates the caller's session for this problem, or resets an existing one \
        to the canonical content. Requires the write or admin tier; pulling discards local \
        edits, so the read tier may not do it.",
    params(("id" = u64, Path, description = "Problem ID")),
    responses(
        (status = 200, description = "Session ready", body = PullProblemResponse),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Problem not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user))]
pub async fn pull_problem(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let problem = state.problems.get(id).await?;
    access::require_editor(&problem.managers, &identity.user)?;

    let session = state
        .sessions
        .pull_or_init(&problem, &identity.user)
        .await?;
    tracing::info!(problem = id, session = %session.id, "session pulled");

    Ok(Json(PullProblemResponse {
        session_id: session.id,
        base_version: session.base_version,
    }))
}

#[utoipa::path(
    get,
    path = "/{id}/access",
    tag = "Problems",
    operation_id = "getAccess",
    summary = "List access records",
    params(("id" = u64, Path, description = "Problem ID")),
    responses(
        (status = 200, description = "Access records by tier", body = AccessResponse),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Problem not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user))]
pub async fn get_access(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, AppError> {
    let problem = state.problems.get(id).await?;
    access::require_editor(&problem.managers, &identity.user)?;

    let mut response = AccessResponse {
        admin: Vec::new(),
        write: Vec::new(),
        read: Vec::new(),
    };
    for (user, tier) in &problem.managers {
        match tier {
            AccessTier::Admin => response.admin.push(user.clone()),
            AccessTier::Write => response.write.push(user.clone()),
            AccessTier::Read => response.read.push(user.clone()),
        }
    }
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/{id}/access",
    tag = "Problems",
    operation_id = "updateAccess",
    summary = "Bulk-update access records",
    description = "Replaces the read and write records with the given lists; a user in both \
        lists ends up with write. Admin records are never changed or removed by this \
        endpoint. Non-admin users absent from both lists lose access.",
    params(("id" = u64, Path, description = "Problem ID")),
    request_body = UpdateAccessRequest,
    responses(
        (status = 200, description = "Access updated", body = OkBody),
        (status = 400, description = "Bad user list (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Problem not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user))]
pub async fn update_access(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<u64>,
    AppJson(payload): AppJson<UpdateAccessRequest>,
) -> Result<impl IntoResponse, AppError> {
    let problem = state.problems.get(id).await?;
    access::require_editor(&problem.managers, &identity.user)?;
    validate_update_access(&payload)?;

    let next = access::apply_access_update(&problem.managers, &payload.read, &payload.write);
    state.problems.set_access(id, next).await?;

    tracing::info!(problem = id, "access records replaced");
    Ok(Json(OkBody::ok()))
}
