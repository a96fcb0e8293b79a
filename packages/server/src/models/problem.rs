use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::access::AccessTier;
use crate::error::AppError;
use crate::extractors::valid_username;
use crate::session::SessionBrief;

pub use super::shared::{PageQuery, Pagination};

/// Most users one bulk access update may grant.
const MAX_ACCESS_USERS: usize = 100;

#[derive(Deserialize, ToSchema)]
pub struct CreateProblemRequest {
    /// Short lowercase identifier, `[a-z0-9]{2,30}`.
    #[schema(example = "aplusb")]
    pub alias: String,
}

#[derive(Serialize, ToSchema)]
pub struct CreateProblemResponse {
    pub id: u64,
    pub alias: String,
    pub title: String,
    /// Edit session opened for the creator.
    pub session_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProblemListItem {
    pub id: u64,
    pub alias: String,
    pub title: String,
    /// Canonical version, bumped on every push.
    pub version: u64,
    /// The caller's tier on this problem.
    pub access: AccessTier,
    pub updated_at: DateTime<Utc>,
    /// Open edit sessions across all users.
    pub sessions: Vec<SessionBrief>,
}

#[derive(Serialize, ToSchema)]
pub struct ProblemListResponse {
    pub data: Vec<ProblemListItem>,
    pub pagination: Pagination,
}

#[derive(Serialize, ToSchema)]
pub struct PullProblemResponse {
    /// The caller's session, created or refreshed.
    pub session_id: String,
    /// Canonical version the session is now based on.
    pub base_version: u64,
}

/// Access records of one problem, grouped by tier.
#[derive(Serialize, ToSchema)]
pub struct AccessResponse {
    pub admin: Vec<String>,
    pub write: Vec<String>,
    pub read: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateAccessRequest {
    /// Users granted the read tier.
    #[serde(default)]
    pub read: Vec<String>,
    /// Users granted the write tier; wins over `read` on duplicates.
    #[serde(default)]
    pub write: Vec<String>,
}

pub fn validate_update_access(req: &UpdateAccessRequest) -> Result<(), AppError> {
    if req.read.len() + req.write.len() > MAX_ACCESS_USERS {
        return Err(AppError::Validation(format!(
            "At most {MAX_ACCESS_USERS} users per access update"
        )));
    }
    for user in req.read.iter().chain(req.write.iter()) {
        if !valid_username(user) {
            return Err(AppError::Validation(format!("Invalid username: {user}")));
        }
    }
    Ok(())
}
