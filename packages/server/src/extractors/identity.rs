use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the acting user, set by the fronting gateway.
pub const IDENTITY_HEADER: &str = "x-polygon-user";

/// Acting user extracted from the `X-Polygon-User` header.
///
/// Authentication happens upstream; this service only needs to know who is
/// acting. Add this as a handler parameter to require an identity. Tier
/// checks against a specific problem happen in the handler body.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: String,
}

pub(crate) fn valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(IDENTITY_HEADER)
            .ok_or(AppError::IdentityMissing)?;

        let user = raw
            .to_str()
            .map_err(|_| AppError::IdentityInvalid)?
            .trim()
            .to_string();

        if !valid_username(&user) {
            return Err(AppError::IdentityInvalid);
        }

        Ok(Identity { user })
    }
}
