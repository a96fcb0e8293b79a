use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

fn default_well_form() -> bool {
    true
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCaseRequest {
    /// Case input text.
    pub input: String,
    /// Expected output text; may be attached later by a run.
    #[serde(default)]
    pub output: Option<String>,
    /// Normalize whitespace before storing.
    #[serde(default = "default_well_form")]
    pub well_form: bool,
}

#[derive(Serialize, ToSchema)]
pub struct CreateCaseResponse {
    pub fingerprint: String,
    /// False when an identical case was already present.
    pub created: bool,
}

#[derive(Serialize, ToSchema)]
pub struct UploadCasesResponse {
    pub created: usize,
    /// Fingerprints of the created cases, in judge order.
    pub fingerprints: Vec<String>,
}

/// Total replacement of the judge order.
#[derive(Deserialize, ToSchema)]
pub struct ReorderCasesRequest {
    /// Fingerprints in their new judge order (1-based positions assigned
    /// by array index).
    pub ordered: Vec<String>,
    /// Fingerprints parked as unused (order 0).
    #[serde(default)]
    pub unused: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CasePointRequest {
    /// Score weight.
    pub point: u32,
}

#[derive(Deserialize, ToSchema)]
pub struct ReformRequest {
    /// Normalize only the input, leaving output bytes untouched.
    #[serde(default)]
    pub input_only: bool,
}

#[derive(Serialize, ToSchema)]
pub struct ReformResponse {
    /// Cases whose data actually changed.
    pub reformed: usize,
}

#[derive(Serialize, ToSchema)]
pub struct CasePreviewResponse {
    pub fingerprint: String,
    /// Truncated input text.
    pub input: String,
    /// Truncated output text, when the case has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ToggleResponse {
    /// The flag's new value.
    pub enabled: bool,
}

pub fn validate_reorder(req: &ReorderCasesRequest) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for fp in req.ordered.iter().chain(req.unused.iter()) {
        if !seen.insert(fp.as_str()) {
            return Err(AppError::Validation(format!(
                "Duplicate fingerprint {fp} in reorder list"
            )));
        }
    }
    Ok(())
}
