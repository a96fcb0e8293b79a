use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::document::ProgramCategory;
use crate::error::AppError;
use crate::utils::filename::validate_flat_filename;

/// Upper bound on stored program source.
const MAX_CODE_SIZE: usize = 256 * 1024;

#[derive(Deserialize, ToSchema)]
pub struct CreateProgramRequest {
    #[schema(example = "checker.cpp")]
    pub filename: String,
    pub category: ProgramCategory,
    #[schema(example = "cpp")]
    pub language: String,
    /// Full source text.
    pub code: String,
}

/// Replace (and possibly rename) an existing program.
#[derive(Deserialize, ToSchema)]
pub struct UpdateProgramRequest {
    /// Filename the entry is currently registered under.
    pub raw_filename: String,
    pub filename: String,
    pub category: ProgramCategory,
    pub language: String,
    pub code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ImportProgramRequest {
    /// Builtin template filename, e.g. "ncmp.cpp".
    pub filename: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProgramSourceResponse {
    pub filename: String,
    pub category: ProgramCategory,
    pub language: String,
    pub code: String,
}

/// Shared field checks for program create and update.
pub fn validate_program_fields(
    filename: &str,
    language: &str,
    code: &str,
) -> Result<(), AppError> {
    validate_flat_filename(filename).map_err(|e| AppError::Validation(e.message().into()))?;

    let language = language.trim();
    if language.is_empty() || language.len() > 32 {
        return Err(AppError::Validation(
            "Language must be 1-32 characters".into(),
        ));
    }
    if code.trim().is_empty() {
        return Err(AppError::Validation(
            "Program code must not be empty".into(),
        ));
    }
    if code.len() > MAX_CODE_SIZE {
        return Err(AppError::Validation(format!(
            "Program code must not exceed {} KB",
            MAX_CODE_SIZE / 1024
        )));
    }
    Ok(())
}
