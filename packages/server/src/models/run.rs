use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::AppError;

pub const MIN_STRESS_MINUTES: u64 = 1;
pub const MAX_STRESS_MINUTES: u64 = 5;

#[derive(Deserialize, ToSchema)]
pub struct ValidateRunRequest {
    /// Validator program filename.
    pub program: String,
    /// Single case to validate; absent means all ordered cases.
    #[serde(default)]
    pub fingerprint: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct OutputRunRequest {
    /// Solution program that produces the outputs.
    pub program: String,
    /// Single case to run; absent means all ordered cases.
    #[serde(default)]
    pub fingerprint: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckRunRequest {
    /// Solution program under test.
    pub program: String,
    /// Checker program filename.
    pub checker: String,
    /// Single case to check; absent means all ordered cases.
    #[serde(default)]
    pub fingerprint: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateRunRequest {
    /// Generator program filename.
    pub program: String,
    /// Command-line argument string passed to the generator.
    #[serde(default)]
    pub param: String,
}

#[derive(Deserialize, ToSchema)]
pub struct StressRunRequest {
    /// Generator producing random inputs.
    pub generator: String,
    /// Solution put under stress.
    pub submission: String,
    /// Command-line argument string passed to the generator.
    #[serde(default)]
    pub param: String,
    /// Wall-clock budget, 1 to 5 minutes.
    pub minutes: u64,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct RunListQuery {
    /// Restrict the listing to one session.
    pub session: Option<String>,
}

/// Stress budgets outside the window are rejected before queueing.
pub fn validate_stress_minutes(minutes: u64) -> Result<u64, AppError> {
    if !(MIN_STRESS_MINUTES..=MAX_STRESS_MINUTES).contains(&minutes) {
        return Err(AppError::Validation(format!(
            "Stress budget must be between {MIN_STRESS_MINUTES} and {MAX_STRESS_MINUTES} minutes"
        )));
    }
    Ok(minutes * 60)
}
