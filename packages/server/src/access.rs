//! Per-problem access tiers and the bulk access update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// What a user may do with a problem.
///
/// `Read` can inspect sessions but never mutate. `Write` owns the full
/// authoring surface. `Admin` additionally manages access and is immune to
/// bulk updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    Admin,
    Write,
    Read,
}

impl AccessTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Write => "write",
            Self::Read => "read",
        }
    }

    /// Whether this tier may mutate sessions and publish.
    pub fn can_edit(&self) -> bool {
        matches!(self, Self::Admin | Self::Write)
    }
}

/// user -> tier for one problem.
pub type AccessMap = BTreeMap<String, AccessTier>;

/// Tier of `user`, or `PermissionDenied` when they have no record.
pub fn require_member(map: &AccessMap, user: &str) -> Result<AccessTier, AppError> {
    map.get(user).copied().ok_or(AppError::PermissionDenied)
}

/// Like [`require_member`], but additionally rejects the read tier.
pub fn require_editor(map: &AccessMap, user: &str) -> Result<AccessTier, AppError> {
    let tier = require_member(map, user)?;
    if tier.can_edit() {
        Ok(tier)
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// Rebuild the access map from a bulk update.
///
/// The read list is applied first, then the write list, so a user named in
/// both ends up with write. Admin records survive untouched whether or not
/// they are listed. Every other record absent from both lists is dropped.
pub fn apply_access_update(current: &AccessMap, read: &[String], write: &[String]) -> AccessMap {
    let mut requested: BTreeMap<&str, AccessTier> = BTreeMap::new();
    for user in read {
        requested.insert(user, AccessTier::Read);
    }
    for user in write {
        // possible rewrite happens here
        requested.insert(user, AccessTier::Write);
    }

    let mut next = AccessMap::new();
    for (user, tier) in current {
        let upload = requested.remove(user.as_str());
        if *tier == AccessTier::Admin {
            next.insert(user.clone(), AccessTier::Admin);
            continue;
        }
        if let Some(updated) = upload {
            next.insert(user.clone(), updated);
        }
    }
    for (user, tier) in requested {
        next.insert(user.to_string(), tier);
    }
    next
}
