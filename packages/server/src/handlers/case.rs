use std::collections::BTreeMap;
use std::io::Read;

use axum::Json;
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use common::case::{case_fingerprint, well_form_bytes};
use common::storage::ContentHash;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use crate::document::{CaseEntry, DEFAULT_CASE_POINT, ProblemContent};
use crate::error::{AppError, ErrorBody, OkBody};
use crate::extractors::{AppJson, Identity};
use crate::models::case::{
    CasePointRequest, CasePreviewResponse, CreateCaseRequest, CreateCaseResponse,
    ReformRequest, ReformResponse, ReorderCasesRequest, ToggleResponse, UploadCasesResponse,
    validate_reorder,
};
use crate::models::shared::{parse_fingerprint, truncate_preview};
use crate::quota;
use crate::state::AppState;
use crate::utils::filename::{
    contains_path_traversal, extract_stem, is_sample_directory, split_dir_filename,
};

use super::{open_session_edit, open_session_read, session_edit_guard};

/// Largest single file we will inflate out of an archive.
const MAX_DECOMPRESSED_FILE_SIZE: u64 = 128 * 1024 * 1024;
/// Largest total we will inflate out of one archive (zip-bomb guard).
const MAX_TOTAL_DECOMPRESSED_SIZE: u64 = 2048 * 1024 * 1024;

#[utoipa::path(
    post,
    path = "/{sid}/cases",
    tag = "Cases",
    operation_id = "createCase",
    summary = "Create a case from text",
    description = "Stores one case given inline. With `well_form` (the default) whitespace \
        is normalized before fingerprinting. Identical data is only ever stored once: \
        creating a case that already exists returns its fingerprint with `created` false.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = CreateCaseRequest,
    responses(
        (status = 201, description = "Case created", body = CreateCaseResponse),
        (status = 200, description = "Identical case already present", body = CreateCaseResponse),
        (status = 400, description = "Empty input or quota exceeded (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn create_case(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<CreateCaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;

    let (input, output) = if payload.well_form {
        (
            well_form_bytes(payload.input.as_bytes()),
            payload
                .output
                .as_deref()
                .map(|o| well_form_bytes(o.as_bytes())),
        )
    } else {
        (
            payload.input.into_bytes(),
            payload.output.map(String::into_bytes),
        )
    };
    if input.is_empty() {
        return Err(AppError::Validation("Case input must not be empty".into()));
    }

    let fingerprint = case_fingerprint(&input, output.as_deref());
    if access.lock.content().case(&fingerprint).is_some() {
        return Ok((
            StatusCode::OK,
            Json(CreateCaseResponse {
                fingerprint: fingerprint.to_hex(),
                created: false,
            }),
        ));
    }

    let incoming = input.len() as u64 + output.as_ref().map_or(0, |o| o.len() as u64);
    quota::ensure_capacity(
        state.blobs.as_ref(),
        access.lock.content(),
        incoming,
        state.config.storage.problem_quota,
    )
    .await?;

    let input_hash = state.blobs.put(&input).await?;
    let output_hash = match &output {
        Some(data) => Some(state.blobs.put(data).await?),
        None => None,
    };

    let order = access.lock.content().next_order();
    access.lock.content_mut().insert_case(
        fingerprint,
        CaseEntry {
            order,
            point: DEFAULT_CASE_POINT,
            pretest: false,
            sample: false,
            input: input_hash,
            output: output_hash,
            well_form: payload.well_form,
        },
    );
    access.lock.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateCaseResponse {
            fingerprint: fingerprint.to_hex(),
            created: true,
        }),
    ))
}

/// One case parsed out of an uploaded file.
struct ArchiveCase {
    input: Vec<u8>,
    output: Option<Vec<u8>>,
    sample: bool,
}

#[utoipa::path(
    post,
    path = "/{sid}/cases/upload",
    tag = "Cases",
    operation_id = "uploadCases",
    summary = "Upload cases from a file",
    description = "Multipart upload under the `file` field. A `.zip` is unpacked into \
        matched `name.in`/`name.ans` (or `.out`) pairs; entries under a `sample` directory \
        are flagged as samples and ordered first. Any other file becomes a single \
        input-only case. The optional `well_form` field controls normalization (default \
        on); inputs that normalize to nothing are dropped. Cases identical to existing \
        ones are skipped.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Cases stored", body = UploadCasesResponse),
        (status = 400, description = "Bad archive or quota exceeded (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, multipart), fields(user = %identity.user, sid = %sid))]
pub async fn upload_cases(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    // Check permissions before consuming the body.
    session_edit_guard(&state, &sid, &identity.user).await?;

    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut well_form = true;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart read error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                file_name = field.file_name().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                file_bytes = Some(data.to_vec());
            }
            Some("well_form") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Multipart read error: {e}")))?;
                well_form = matches!(text.trim(), "1" | "true" | "on" | "yes");
            }
            _ => {}
        }
    }

    let data = file_bytes.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    let is_zip = file_name
        .as_deref()
        .is_some_and(|n| n.to_lowercase().ends_with(".zip"));

    let parsed = if is_zip {
        parse_zip_cases(&data)?
    } else {
        vec![ArchiveCase {
            input: data,
            output: None,
            sample: false,
        }]
    };

    let mut access = open_session_edit(&state, &sid, &identity.user).await?;

    let mut incoming = 0u64;
    let mut prepared = Vec::with_capacity(parsed.len());
    for case in parsed {
        let (input, output) = if well_form {
            (
                well_form_bytes(&case.input),
                case.output.as_deref().map(well_form_bytes),
            )
        } else {
            (case.input, case.output)
        };
        if input.is_empty() {
            continue;
        }
        incoming += input.len() as u64 + output.as_ref().map_or(0, |o| o.len() as u64);
        prepared.push((input, output, case.sample));
    }
    quota::ensure_capacity(
        state.blobs.as_ref(),
        access.lock.content(),
        incoming,
        state.config.storage.problem_quota,
    )
    .await?;

    let mut order = access.lock.content().next_order();
    let mut fingerprints = Vec::new();
    for (input, output, sample) in prepared {
        let fingerprint = case_fingerprint(&input, output.as_deref());
        if access.lock.content().case(&fingerprint).is_some() {
            continue;
        }
        let input_hash = state.blobs.put(&input).await?;
        let output_hash = match &output {
            Some(data) => Some(state.blobs.put(data).await?),
            None => None,
        };
        access.lock.content_mut().insert_case(
            fingerprint,
            CaseEntry {
                order,
                point: DEFAULT_CASE_POINT,
                pretest: false,
                sample,
                input: input_hash,
                output: output_hash,
                well_form,
            },
        );
        order += 1;
        fingerprints.push(fingerprint.to_hex());
    }

    if !fingerprints.is_empty() {
        access.lock.commit().await?;
    }
    tracing::info!(created = fingerprints.len(), "cases uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadCasesResponse {
            created: fingerprints.len(),
            fingerprints,
        }),
    ))
}

/// Parse a ZIP archive into `.in`/`.ans` case pairs.
///
/// Pairing is by path stem: `tests/3.in` matches `tests/3.ans` (or
/// `tests/3.out`). Every input must have a matching output and vice
/// versa. Samples sort before other cases, then archive path order.
fn parse_zip_cases(data: &[u8]) -> Result<Vec<ArchiveCase>, AppError> {
    let cursor = std::io::Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor)
        .map_err(|e| AppError::Validation(format!("Invalid ZIP archive: {e}")))?;

    // key -> (bytes, from a sample directory)
    let mut in_files: BTreeMap<String, (Vec<u8>, bool)> = BTreeMap::new();
    let mut out_files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut total_decompressed: u64 = 0;

    for index in 0..archive.len() {
        let file = archive
            .by_index(index)
            .map_err(|e| AppError::Validation(format!("ZIP read error: {e}")))?;
        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        if contains_path_traversal(&name) {
            continue;
        }
        let (dir, _) = split_dir_filename(&name);
        let sample = is_sample_directory(dir);
        let Some((key, ext)) = extract_stem(&name) else {
            continue;
        };
        if !matches!(ext, "in" | "ans" | "out") {
            continue;
        }
        let key = key.to_string();
        let ext = ext.to_string();

        let mut buf = Vec::new();
        file.take(MAX_DECOMPRESSED_FILE_SIZE + 1)
            .read_to_end(&mut buf)
            .map_err(|e| AppError::Validation(format!("Failed to read '{name}': {e}")))?;
        if buf.len() as u64 > MAX_DECOMPRESSED_FILE_SIZE {
            return Err(AppError::Validation(format!(
                "File '{name}' exceeds the 128MB decompressed size limit"
            )));
        }
        total_decompressed += buf.len() as u64;
        if total_decompressed > MAX_TOTAL_DECOMPRESSED_SIZE {
            return Err(AppError::Validation(
                "Archive exceeds the 2048MB total decompressed size limit".into(),
            ));
        }

        if ext == "in" {
            if in_files.contains_key(&key) {
                return Err(AppError::Validation(format!(
                    "Duplicate input file for case '{key}'"
                )));
            }
            in_files.insert(key, (buf, sample));
        } else {
            if out_files.contains_key(&key) {
                return Err(AppError::Validation(format!(
                    "Duplicate output file for case '{key}' (both .ans and .out?)"
                )));
            }
            out_files.insert(key, buf);
        }
    }

    let mut unmatched_in = Vec::new();
    let mut staged: Vec<((u8, String), ArchiveCase)> = Vec::new();
    for (key, (input, sample)) in in_files {
        match out_files.remove(&key) {
            Some(output) => {
                let priority = if sample { 0u8 } else { 1 };
                staged.push((
                    (priority, key),
                    ArchiveCase {
                        input,
                        output: Some(output),
                        sample,
                    },
                ));
            }
            None => unmatched_in.push(key),
        }
    }

    if !unmatched_in.is_empty() || !out_files.is_empty() {
        let mut parts = Vec::new();
        if !unmatched_in.is_empty() {
            parts.push(format!(
                ".in files without matching .ans: {}",
                unmatched_in.join(", ")
            ));
        }
        if !out_files.is_empty() {
            let keys: Vec<_> = out_files.keys().cloned().collect();
            parts.push(format!(
                ".ans files without matching .in: {}",
                keys.join(", ")
            ));
        }
        return Err(AppError::Validation(parts.join("; ")));
    }
    if staged.is_empty() {
        return Err(AppError::Validation(
            "ZIP contains no .in/.ans case pairs".into(),
        ));
    }

    staged.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(staged.into_iter().map(|(_, case)| case).collect())
}

#[utoipa::path(
    get,
    path = "/{sid}/cases/{fingerprint}",
    tag = "Cases",
    operation_id = "getCase",
    summary = "Preview a case",
    description = "Returns the first hundred characters of the case's input and output. \
        Use the download endpoints for the full data.",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("fingerprint" = String, Path, description = "Case fingerprint"),
    ),
    responses(
        (status = 200, description = "Case preview", body = CasePreviewResponse),
        (status = 400, description = "Malformed fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or case not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn get_case(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, fingerprint)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let access = open_session_read(&state, &sid, &identity.user).await?;
    let fp = parse_fingerprint(&fingerprint)?;
    let entry = access
        .lock
        .content()
        .case(&fp)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Case {} not found", fp.short())))?;

    let input = state.blobs.get(&entry.input).await?;
    let output = match entry.output {
        Some(hash) => Some(state.blobs.get(&hash).await?),
        None => None,
    };

    Ok(Json(CasePreviewResponse {
        fingerprint: fp.to_hex(),
        input: truncate_preview(&String::from_utf8_lossy(&input)),
        output: output.map(|o| truncate_preview(&String::from_utf8_lossy(&o))),
    }))
}

#[utoipa::path(
    delete,
    path = "/{sid}/cases/{fingerprint}",
    tag = "Cases",
    operation_id = "deleteCase",
    summary = "Remove a case",
    description = "Drops the case entry from the session. The underlying data stays in \
        blob storage, where the canonical problem or other sessions may still reference \
        it. Removing an absent case is not an error.",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("fingerprint" = String, Path, description = "Case fingerprint"),
    ),
    responses(
        (status = 200, description = "Case gone", body = OkBody),
        (status = 400, description = "Malformed fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn delete_case(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, fingerprint)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    let fp = parse_fingerprint(&fingerprint)?;
    if access.lock.content_mut().remove_case(&fp).is_some() {
        access.lock.commit().await?;
    }
    Ok(Json(OkBody::ok()))
}

#[utoipa::path(
    put,
    path = "/{sid}/cases/reorder",
    tag = "Cases",
    operation_id = "reorderCases",
    summary = "Replace the judge order",
    description = "Assigns 1-based orders by position in `ordered` and parks everything in \
        `unused` at order zero. Cases in neither list keep their order. Every listed \
        fingerprint must exist.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = ReorderCasesRequest,
    responses(
        (status = 200, description = "Order replaced", body = OkBody),
        (status = 400, description = "Unknown or duplicate fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn reorder_cases(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<ReorderCasesRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_reorder(&payload)?;
    let ordered = payload
        .ordered
        .iter()
        .map(|s| parse_fingerprint(s))
        .collect::<Result<Vec<_>, _>>()?;
    let unused = payload
        .unused
        .iter()
        .map(|s| parse_fingerprint(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    access
        .lock
        .content_mut()
        .reorder_cases(&ordered, &unused)
        .map_err(AppError::Validation)?;
    access.lock.commit().await?;

    Ok(Json(OkBody::ok()))
}

#[utoipa::path(
    post,
    path = "/{sid}/cases/reform",
    tag = "Cases",
    operation_id = "reformAllCases",
    summary = "Re-normalize every case",
    description = "Rewrites each case's data in normalized form; fingerprints change \
        accordingly while order, points and flags carry over. Cases that normalize to \
        data another case already has merge into it. With `input_only` the output bytes \
        are kept verbatim.",
    params(("sid" = String, Path, description = "Session ID")),
    request_body = ReformRequest,
    responses(
        (status = 200, description = "Reform done", body = ReformResponse),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn reform_all_cases(
    identity: Identity,
    State(state): State<AppState>,
    Path(sid): Path<String>,
    AppJson(payload): AppJson<ReformRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    let fps: Vec<ContentHash> = access.lock.content().cases.keys().copied().collect();

    let mut reformed = 0;
    for fp in fps {
        if reform_one(&state, access.lock.content_mut(), fp, payload.input_only).await? {
            reformed += 1;
        }
    }
    if reformed > 0 {
        access.lock.commit().await?;
    }
    Ok(Json(ReformResponse { reformed }))
}

#[utoipa::path(
    post,
    path = "/{sid}/cases/{fingerprint}/reform",
    tag = "Cases",
    operation_id = "reformCase",
    summary = "Re-normalize one case",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("fingerprint" = String, Path, description = "Case fingerprint"),
    ),
    request_body = ReformRequest,
    responses(
        (status = 200, description = "Reform done; `reformed` is 0 or 1", body = ReformResponse),
        (status = 400, description = "Malformed fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or case not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn reform_case(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, fingerprint)): Path<(String, String)>,
    AppJson(payload): AppJson<ReformRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    let fp = parse_fingerprint(&fingerprint)?;

    let changed = reform_one(&state, access.lock.content_mut(), fp, payload.input_only).await?;
    if changed {
        access.lock.commit().await?;
    }
    Ok(Json(ReformResponse {
        reformed: usize::from(changed),
    }))
}

/// Re-normalize one case in place. Returns whether the stored data
/// actually changed.
async fn reform_one(
    state: &AppState,
    content: &mut ProblemContent,
    fp: ContentHash,
    input_only: bool,
) -> Result<bool, AppError> {
    let old = content
        .case(&fp)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Case {} not found", fp.short())))?;

    let raw_input = state.blobs.get(&old.input).await?;
    let raw_output = match old.output {
        Some(hash) => Some(state.blobs.get(&hash).await?),
        None => None,
    };

    let input = well_form_bytes(&raw_input);
    let output = if input_only {
        raw_output
    } else {
        raw_output.as_deref().map(well_form_bytes)
    };

    let new_fp = case_fingerprint(&input, output.as_deref());
    if new_fp == fp {
        return Ok(false);
    }

    let input_hash = state.blobs.put(&input).await?;
    let output_hash = match &output {
        Some(data) => Some(state.blobs.put(data).await?),
        None => None,
    };

    content.remove_case(&fp);
    // If the normalized data collides with an existing case, the two
    // merge and the existing entry wins.
    content.insert_case(
        new_fp,
        CaseEntry {
            order: old.order,
            point: old.point,
            pretest: old.pretest,
            sample: old.sample,
            input: input_hash,
            output: output_hash,
            well_form: if input_only { old.well_form } else { true },
        },
    );
    Ok(true)
}

#[utoipa::path(
    put,
    path = "/{sid}/cases/{fingerprint}/point",
    tag = "Cases",
    operation_id = "setCasePoint",
    summary = "Set a case's score weight",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("fingerprint" = String, Path, description = "Case fingerprint"),
    ),
    request_body = CasePointRequest,
    responses(
        (status = 200, description = "Point saved", body = OkBody),
        (status = 400, description = "Malformed fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or case not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity, payload), fields(user = %identity.user, sid = %sid))]
pub async fn set_case_point(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, fingerprint)): Path<(String, String)>,
    AppJson(payload): AppJson<CasePointRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    let fp = parse_fingerprint(&fingerprint)?;
    access
        .lock
        .content_mut()
        .set_case_point(&fp, payload.point)
        .map_err(AppError::NotFound)?;
    access.lock.commit().await?;
    Ok(Json(OkBody::ok()))
}

#[utoipa::path(
    post,
    path = "/{sid}/cases/{fingerprint}/pretest",
    tag = "Cases",
    operation_id = "togglePretest",
    summary = "Toggle the pretest flag",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("fingerprint" = String, Path, description = "Case fingerprint"),
    ),
    responses(
        (status = 200, description = "Flag flipped", body = ToggleResponse),
        (status = 400, description = "Malformed fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or case not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn toggle_pretest(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, fingerprint)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    let fp = parse_fingerprint(&fingerprint)?;
    let enabled = access
        .lock
        .content_mut()
        .toggle_pretest(&fp)
        .map_err(AppError::NotFound)?;
    access.lock.commit().await?;
    Ok(Json(ToggleResponse { enabled }))
}

#[utoipa::path(
    post,
    path = "/{sid}/cases/{fingerprint}/sample",
    tag = "Cases",
    operation_id = "toggleSample",
    summary = "Toggle the sample flag",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("fingerprint" = String, Path, description = "Case fingerprint"),
    ),
    responses(
        (status = 200, description = "Flag flipped", body = ToggleResponse),
        (status = 400, description = "Malformed fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or case not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn toggle_sample(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, fingerprint)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let mut access = open_session_edit(&state, &sid, &identity.user).await?;
    let fp = parse_fingerprint(&fingerprint)?;
    let enabled = access
        .lock
        .content_mut()
        .toggle_sample(&fp)
        .map_err(AppError::NotFound)?;
    access.lock.commit().await?;
    Ok(Json(ToggleResponse { enabled }))
}

#[utoipa::path(
    get,
    path = "/{sid}/cases/{fingerprint}/input",
    tag = "Cases",
    operation_id = "downloadCaseInput",
    summary = "Download a case's input",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("fingerprint" = String, Path, description = "Case fingerprint"),
    ),
    responses(
        (status = 200, description = "Input data as a text attachment"),
        (status = 400, description = "Malformed fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or case not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn download_input(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, fingerprint)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let access = open_session_read(&state, &sid, &identity.user).await?;
    let fp = parse_fingerprint(&fingerprint)?;
    let entry = access
        .lock
        .content()
        .case(&fp)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Case {} not found", fp.short())))?;

    case_data_response(&state, entry.input, format!("{}.in", fp.to_hex())).await
}

#[utoipa::path(
    get,
    path = "/{sid}/cases/{fingerprint}/output",
    tag = "Cases",
    operation_id = "downloadCaseOutput",
    summary = "Download a case's output",
    params(
        ("sid" = String, Path, description = "Session ID"),
        ("fingerprint" = String, Path, description = "Case fingerprint"),
    ),
    responses(
        (status = 200, description = "Output data as a text attachment"),
        (status = 400, description = "Malformed fingerprint (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (IDENTITY_MISSING, IDENTITY_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Session or case not found, or case has no output (NOT_FOUND)", body = ErrorBody),
    ),
    security(("identity" = [])),
)]
#[instrument(skip(state, identity), fields(user = %identity.user, sid = %sid))]
pub async fn download_output(
    identity: Identity,
    State(state): State<AppState>,
    Path((sid, fingerprint)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let access = open_session_read(&state, &sid, &identity.user).await?;
    let fp = parse_fingerprint(&fingerprint)?;
    let entry = access
        .lock
        .content()
        .case(&fp)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Case {} not found", fp.short())))?;
    let hash = entry
        .output
        .ok_or_else(|| AppError::NotFound(format!("Case {} has no output", fp.short())))?;

    case_data_response(&state, hash, format!("{}.out", fp.to_hex())).await
}

/// Stream case data as a plain-text attachment. The filename is always
/// hex-derived, so no header escaping is needed.
async fn case_data_response(
    state: &AppState,
    hash: ContentHash,
    filename: String,
) -> Result<Response, AppError> {
    let size = state.blobs.size(&hash).await?;
    let reader = state.blobs.get_stream(&hash).await?;
    let body = Body::from_stream(ReaderStream::new(reader));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

/// Body limit for the JSON case endpoints (32MB).
pub fn case_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(32 * 1024 * 1024)
}

/// Body limit for archive uploads (128MB).
pub fn archive_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(128 * 1024 * 1024)
}
