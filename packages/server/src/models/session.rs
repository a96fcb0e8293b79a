use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::document::ProgramCategory;

/// Extensions rendered inline by statement editors.
const IMAGE_EXTENSIONS: &[&str] = &["gif", "jpg", "jpeg", "tiff", "png"];

/// Full meta save. Role fields bind registered program filenames; empty or
/// absent fields unbind the role.
#[derive(Deserialize, ToSchema)]
pub struct SaveMetaRequest {
    #[schema(example = "aplusb")]
    pub alias: String,
    #[schema(example = "A + B")]
    pub title: String,
    #[schema(example = 2000)]
    pub time_limit_ms: u64,
    #[schema(example = 256)]
    pub memory_limit_mb: u64,
    /// Provenance note.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub checker: Option<String>,
    #[serde(default)]
    pub interactor: Option<String>,
    #[serde(default)]
    pub validator: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Result of a successful push to the canonical problem.
#[derive(Serialize, ToSchema)]
pub struct PushSessionResponse {
    /// New canonical version.
    pub version: u64,
}

/// One case in the snapshot, metadata plus stored sizes.
#[derive(Serialize, ToSchema)]
pub struct CaseView {
    pub fingerprint: String,
    /// 1-based judge order; 0 when the case is parked as unused.
    pub order: u32,
    pub used: bool,
    pub point: u32,
    pub pretest: bool,
    pub sample: bool,
    pub well_form: bool,
    /// Input size in bytes (0 if the blob has gone missing).
    pub input_size: u64,
    /// Output size in bytes; absent when the case has no output yet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
}

/// One registered program, cross-joined with its role binding.
#[derive(Serialize, ToSchema)]
pub struct ProgramView {
    pub filename: String,
    pub category: ProgramCategory,
    pub language: String,
    /// The role this program is bound to, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<String>,
    /// Source size in bytes.
    pub size: u64,
}

#[derive(Serialize, ToSchema)]
pub struct StatementView {
    pub filename: String,
    /// Text size in bytes.
    pub size: u64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Regular,
}

/// One uploaded support file.
#[derive(Serialize, ToSchema)]
pub struct FileView {
    pub filename: String,
    /// Download path for this file.
    pub url: String,
    pub kind: FileKind,
    pub size: u64,
}

/// The enriched session read-model served by the snapshot endpoint.
#[derive(Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub id: String,
    pub problem_id: u64,
    pub user: String,
    /// Working-copy revision; clients poll this to notice edits.
    pub version: u64,
    /// Canonical version this copy was built from.
    pub base_version: u64,
    /// Current canonical version; ahead of `base_version` means stale.
    pub canonical_version: u64,
    pub updated_at: DateTime<Utc>,

    pub alias: String,
    pub title: String,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
    pub source: String,
    pub interactive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interactor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub case_count: usize,
    pub pretest_count: usize,
    pub sample_count: usize,
    /// Bytes of blob storage the document references.
    pub volume_used: u64,
    /// Storage budget for this problem.
    pub volume_quota: u64,

    pub cases: Vec<CaseView>,
    pub programs: Vec<ProgramView>,
    pub statements: Vec<StatementView>,
    pub files: Vec<FileView>,
}

/// Classify an uploaded file by extension.
pub fn file_kind(filename: &str) -> FileKind {
    let ext = filename.rsplit_once('.').map(|(_, e)| e.to_lowercase());
    match ext {
        Some(e) if IMAGE_EXTENSIONS.contains(&e.as_str()) => FileKind::Image,
        _ => FileKind::Regular,
    }
}
