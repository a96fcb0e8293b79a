use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::exec::{ExecCase, ExecJob, ExecProgram, JobKind, ProgramRole};
use common::storage::ContentHash;
use tracing::instrument;

use crate::document::{CaseEntry, ProblemContent, ProgramCategory};
use crate::error::{AppError, ErrorBody, OkBody};
use crate::extractors::{AppJson, Identity};
use crate::models::run::{
    CheckRunRequest, GenerateRunRequest, OutputRunRequest, RunListQuery, StressRunRequest,
    ValidateRunRequest, validate_stress_minutes,
};
use crate::models::shared::parse_fingerprint;
use crate::runs::RunRecord;
use crate::state::AppState;

use super::open_session_edit;

/// Categories whose programs may run as a candidate solution.
const SOLUTION_CATEGORIES: &[ProgramCategory] = &[ProgramCategory::Model, ProgramCategory::Regular];

/// Look up a registered program and snapshot it into a job under `role`,
/// rejecting category mismatches.
fn resolve_program(
    content: &ProblemContent,
    filename: &str,
    role: ProgramRole,
    allowed: &[ProgramCategory],
) -> Result<ExecProgram, AppError> {
    let entry = content
        .programs
        .get(filename)
        .ok_or_else(|| AppError::NotFound(format!("Program file {filename} not found")))?;

    if !allowed.contains(&entry.category) {
        let wanted = allowed
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        return Err(AppError::Validation(format!(
            "Program file {filename} is registered as {}, expected {wanted}",
            entry.category
        )));
    }

    Ok(ExecProgram {
        role,
        filename: filename.to_string(),
        language: entry.language.clone(),
        source: entry.code.clone(),
    })
}

/// Snapshot the selected cases with their data: one case when a
/// fingerprint is given, every ordered case otherwise.
async fn resolve_cases(
    state: &AppState,
    content: &ProblemContent,
    fingerprint: Option<&str>,
) -> Result<Vec<ExecCase>, AppError> {
    let selected: Vec<(ContentHash, CaseEntry)> = match fingerprint {
        Some(raw) => {
            let fp = parse_fingerprint(raw)?;
            let entry = content.case(&fp).cloned().ok_or_else(|| {
                AppError::Validation(format!("Case {} is not in this session", fp.short()))
            })?;
            vec![(fp, entry)]
        }
        None => content
            .ordered_cases()
            .into_iter()
            .map(|(fp, entry)| (fp, entry.clone()))
            .collect(),
    };
    if selected.is_empty() {
        return Err(AppError::Validation("No cases to run".into()));
    }

    let mut cases = Vec::with_capacity(selected.len());
    for (fp, entry) in selected {
        let input = state.blobs.get(&entry.input).await?;
        let output = match entry.output {
            Some(hash) => Some(state.blobs.get(&hash).await?),
            None => None,
        };
        cases.push(ExecCase {
            fingerprint: fp,
            input,
            output,
        });
    }
    Ok(cases)
}

/// Interactive problems carry their bound interactor along.
fn resolve_interactor(content: &ProblemContent) -> Result<Option<ExecProgram>, AppError> {
    if !content.interactive {
        return Ok(None);
    }
    match content.interactor.as_deref() {
        Some(filename) => Ok(Some(resolve_program(
            content,
            filename,
            ProgramRole::Interactor,
            &[ProgramCategory::Interactor],
        )?)),
        None => Ok(None),
    }
}

fn accepted(run_id: String) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(OkBody::with_run(run_id)))
}

#[utoipa::path(
    post,
    path = "/{sid}/runs/validate",
    tag = "Runs",
    operation_id = "runValidate",
    summary = "Validate case inputs",
    description = "Queues a run of the named validator over one case or all ordered cases. \
        Poll the returned run for the verdict.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = ValidateRunRequest,
    responses(
        (status = 202, description = "Run queued", body = OkBody),
        (status = 400, description = "Bad program or case selection (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or program not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Run queue full (BUSY)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn submit_validate(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<ValidateRunRequest>,
) -> Result<impl IntoResponse, AppError> {
    let access = open_session_edit(&state, &sid, &identity.user).await?;
    let content = access.lock.content();

    let validator = resolve_program(
        content,
        &payload.program,
        ProgramRole::Validator,
        &[ProgramCategory::Validator],
    )?;
    let cases = resolve_cases(&state, content, payload.fingerprint.as_deref()).await?;
    let label = if payload.fingerprint.is_some() {
        "Validate a case"
    } else {
        "Validate all cases"
    };

    let mut job = ExecJob::new(JobKind::Validate, content.time_limit_ms, content.memory_limit_mb);
    job.programs.push(validator);
    job.cases = cases;

    let run_id = state.runs.submit(&sid, &identity.user, label, job)?;
    Ok(accepted(run_id))
}

#[utoipa::path(
    post,
    path = "/{sid}/runs/output",
    tag = "Runs",
    operation_id = "runOutput",
    summary = "Produce case outputs",
    description = "Queues a run of a model or regular solution over the selected cases. \
        Outputs the backend produces are written back into the session's cases, changing \
        their fingerprints.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = OutputRunRequest,
    responses(
        (status = 202, description = "Run queued", body = OkBody),
        (status = 400, description = "Bad program or case selection (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or program not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Run queue full (BUSY)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn submit_output(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<OutputRunRequest>,
) -> Result<impl IntoResponse, AppError> {
    let access = open_session_edit(&state, &sid, &identity.user).await?;
    let content = access.lock.content();

    let solution = resolve_program(
        content,
        &payload.program,
        ProgramRole::Solution,
        SOLUTION_CATEGORIES,
    )?;
    let cases = resolve_cases(&state, content, payload.fingerprint.as_deref()).await?;
    let label = if payload.fingerprint.is_some() {
        "Run case output"
    } else {
        "Run all case outputs"
    };

    let mut job = ExecJob::new(JobKind::RunOutput, content.time_limit_ms, content.memory_limit_mb);
    job.programs.push(solution);
    if let Some(interactor) = resolve_interactor(content)? {
        job.programs.push(interactor);
    }
    job.cases = cases;

    let run_id = state.runs.submit(&sid, &identity.user, label, job)?;
    Ok(accepted(run_id))
}

#[utoipa::path(
    post,
    path = "/{sid}/runs/check",
    tag = "Runs",
    operation_id = "runCheck",
    summary = "Judge a solution",
    description = "Queues a run of a solution over the selected cases, judged by the named \
        checker against the stored outputs.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = CheckRunRequest,
    responses(
        (status = 202, description = "Run queued", body = OkBody),
        (status = 400, description = "Bad program or case selection (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or program not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Run queue full (BUSY)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn submit_check(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<CheckRunRequest>,
) -> Result<impl IntoResponse, AppError> {
    let access = open_session_edit(&state, &sid, &identity.user).await?;
    let content = access.lock.content();

    let solution = resolve_program(
        content,
        &payload.program,
        ProgramRole::Solution,
        SOLUTION_CATEGORIES,
    )?;
    let checker = resolve_program(
        content,
        &payload.checker,
        ProgramRole::Checker,
        &[ProgramCategory::Checker],
    )?;
    let cases = resolve_cases(&state, content, payload.fingerprint.as_deref()).await?;
    let label = if payload.fingerprint.is_some() {
        "Check a case"
    } else {
        "Check all cases"
    };

    let mut job = ExecJob::new(JobKind::Check, content.time_limit_ms, content.memory_limit_mb);
    job.programs.push(solution);
    job.programs.push(checker);
    if let Some(interactor) = resolve_interactor(content)? {
        job.programs.push(interactor);
    }
    job.cases = cases;

    let run_id = state.runs.submit(&sid, &identity.user, label, job)?;
    Ok(accepted(run_id))
}

#[utoipa::path(
    post,
    path = "/{sid}/runs/generate",
    tag = "Runs",
    operation_id = "runGenerate",
    summary = "Generate case inputs",
    description = "Queues a run of the named generator with an optional argument string. \
        Inputs the backend produces are added to the session as new input-only cases.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = GenerateRunRequest,
    responses(
        (status = 202, description = "Run queued", body = OkBody),
        (status = 400, description = "Bad program (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or program not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Run queue full (BUSY)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn submit_generate(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<GenerateRunRequest>,
) -> Result<impl IntoResponse, AppError> {
    let access = open_session_edit(&state, &sid, &identity.user).await?;
    let content = access.lock.content();

    let generator = resolve_program(
        content,
        &payload.program,
        ProgramRole::Generator,
        &[ProgramCategory::Generator],
    )?;

    let mut job = ExecJob::new(JobKind::Generate, content.time_limit_ms, content.memory_limit_mb);
    job.programs.push(generator);
    job.param = Some(payload.param).filter(|p| !p.trim().is_empty());

    let run_id = state.runs.submit(&sid, &identity.user, "Generate cases", job)?;
    Ok(accepted(run_id))
}

#[utoipa::path(
    post,
    path = "/{sid}/runs/stress",
    tag = "Runs",
    operation_id = "runStress",
    summary = "Stress-test a solution",
    description = "Queues a bounded stress loop: the generator produces random inputs, the \
        session's bound model answers them, the named checker compares the submission \
        against the model. Both a model and a checker must be bound on the session. \
        Counterexample inputs found by the backend are added as new cases.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = StressRunRequest,
    responses(
        (status = 202, description = "Run queued", body = OkBody),
        (status = 400, description = "Bad programs, bindings or budget (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or program not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Run queue full (BUSY)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn submit_stress(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<StressRunRequest>,
) -> Result<impl IntoResponse, AppError> {
    let duration_secs = validate_stress_minutes(payload.minutes)?;

    let access = open_session_edit(&state, &sid, &identity.user).await?;
    let content = access.lock.content();

    let generator = resolve_program(
        content,
        &payload.generator,
        ProgramRole::Generator,
        &[ProgramCategory::Generator],
    )?;
    let solution = resolve_program(
        content,
        &payload.submission,
        ProgramRole::Solution,
        SOLUTION_CATEGORIES,
    )?;

    // The oracle pair comes from the session's bindings.
    let model_name = content.model.as_deref().ok_or_else(|| {
        AppError::Validation("Stress testing requires a model solution bound on the session".into())
    })?;
    let checker_name = content.checker.as_deref().ok_or_else(|| {
        AppError::Validation("Stress testing requires a checker bound on the session".into())
    })?;
    let model = resolve_program(content, model_name, ProgramRole::Model, SOLUTION_CATEGORIES)?;
    let checker = resolve_program(
        content,
        checker_name,
        ProgramRole::Checker,
        &[ProgramCategory::Checker],
    )?;

    let mut job = ExecJob::new(JobKind::Stress, content.time_limit_ms, content.memory_limit_mb);
    job.programs = vec![generator, solution, model, checker];
    if let Some(interactor) = resolve_interactor(content)? {
        job.programs.push(interactor);
    }
    job.param = Some(payload.param).filter(|p| !p.trim().is_empty());
    job.duration_secs = Some(duration_secs);

    let run_id = state.runs.submit(&sid, &identity.user, "Stress test", job)?;
    Ok(accepted(run_id))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Runs",
    operation_id = "listRuns",
    summary = "List the caller's runs",
    description = "The caller's hundred most recent runs, newest first, optionally \
        restricted to one session.",
    params(RunListQuery),
    responses(
        (status = 200, description = "Run listing", body = [RunRecord]),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, query), fields(user = %identity.user))]
pub async fn list_runs(
    identity: Identity,
    State(state): State<AppState>,
    Query(query): Query<RunListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let runs = match query.session.as_deref() {
        Some(sid) => state.runs.list_for_session(sid, &identity.user),
        None => state.runs.list_for_user(&identity.user),
    };
    Ok(Json(runs))
}

#[utoipa::path(
    get,
    path = "/{run_id}",
    tag = "Runs",
    operation_id = "getRun",
    summary = "Poll one run",
    description = "Returns the run's current status and, once finished, its verdict \
        message. Only the submitter can see a run.",
    params(("run_id" = String, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run status", body = RunRecord),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 404, description = "Run not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user))]
pub async fn get_run(
    identity: Identity,
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.runs.get(&run_id, &identity.user)?;
    Ok(Json(record))
}
