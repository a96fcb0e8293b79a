use common::storage::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_PER_PAGE: u64 = 50;
pub const MAX_PER_PAGE: u64 = 250;

/// Characters shown before a preview is cut off.
pub const PREVIEW_LENGTH: usize = 100;

/// Pagination metadata included in list responses.
#[derive(Serialize, utoipa::ToSchema)]
pub struct Pagination {
    /// Current page number (1-based).
    #[schema(example = 1)]
    pub page: u64,
    /// Number of items per page.
    #[schema(example = 50)]
    pub per_page: u64,
    /// Total number of matching items across all pages.
    #[schema(example = 7)]
    pub total: u64,
    /// Total number of pages.
    #[schema(example = 1)]
    pub total_pages: u64,
}

/// Page/limit query parameters shared by list endpoints.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<u64>,
    /// Items per page, capped at 250.
    pub per_page: Option<u64>,
}

/// Slice a full result set down to one page.
pub fn paginate<T>(items: Vec<T>, query: &PageQuery) -> (Vec<T>, Pagination) {
    let per_page = query
        .per_page
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    let page = query.page.unwrap_or(1).max(1);

    let total = items.len() as u64;
    let total_pages = total.div_ceil(per_page).max(1);

    let start = ((page - 1) * per_page) as usize;
    let data: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    (
        data,
        Pagination {
            page,
            per_page,
            total,
            total_pages,
        },
    )
}

/// Validate a trimmed title (1-256 Unicode characters).
pub fn validate_title(title: &str) -> Result<(), AppError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > 256 {
        return Err(AppError::Validation(
            "Title must be 1-256 characters".into(),
        ));
    }
    Ok(())
}

/// Truncate long text for preview responses.
pub fn truncate_preview(s: &str) -> String {
    if s.chars().count() > PREVIEW_LENGTH {
        let truncated: String = s.chars().take(PREVIEW_LENGTH).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Parse a hex case fingerprint from a path or body parameter.
pub fn parse_fingerprint(s: &str) -> Result<ContentHash, AppError> {
    ContentHash::from_hex(s)
        .map_err(|e| AppError::Validation(format!("Invalid case fingerprint: {e}")))
}
