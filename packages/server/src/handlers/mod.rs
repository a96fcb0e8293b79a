//! HTTP handlers, one module per resource.
//!
//! Session-scoped handlers all funnel through [`open_session_read`] /
//! [`open_session_edit`], which encode the permission model: any tier may
//! look at a session, mutations need an editor tier and session ownership.

pub mod case;
pub mod file;
pub mod problem;
pub mod program;
pub mod run;
pub mod session;
pub mod statement;

use crate::access::{self, AccessTier};
use crate::error::AppError;
use crate::repo::ProblemDoc;
use crate::session::SessionLock;
use crate::state::AppState;

/// A session opened for one request: the canonical problem, the caller's
/// tier on it, and the exclusive lock on the working copy.
pub(crate) struct SessionAccess {
    pub problem: ProblemDoc,
    #[allow(dead_code)]
    pub tier: AccessTier,
    pub lock: SessionLock,
}

/// Resolve a session id and check the caller may mutate it, without
/// taking the lock. Used to reject uploads before the body is consumed.
pub(crate) async fn session_edit_guard(
    state: &AppState,
    sid: &str,
    user: &str,
) -> Result<(ProblemDoc, AccessTier), AppError> {
    let (problem_id, owner) = state
        .sessions
        .identify(sid)
        .ok_or_else(|| AppError::NotFound(format!("Session {sid} not found")))?;
    let problem = state.problems.get(problem_id).await?;
    let tier = access::require_editor(&problem.managers, user)?;
    if owner != user {
        return Err(AppError::PermissionDenied);
    }
    Ok((problem, tier))
}

/// Open a session for reading. Any access tier on the problem qualifies,
/// including sessions owned by other users.
pub(crate) async fn open_session_read(
    state: &AppState,
    sid: &str,
    user: &str,
) -> Result<SessionAccess, AppError> {
    let (problem_id, _owner) = state
        .sessions
        .identify(sid)
        .ok_or_else(|| AppError::NotFound(format!("Session {sid} not found")))?;
    let problem = state.problems.get(problem_id).await?;
    let tier = access::require_member(&problem.managers, user)?;
    let lock = state.sessions.lock(sid).await?;
    Ok(SessionAccess {
        problem,
        tier,
        lock,
    })
}

/// Open a session for mutation: editor tier on the problem and the
/// session must belong to the caller.
pub(crate) async fn open_session_edit(
    state: &AppState,
    sid: &str,
    user: &str,
) -> Result<SessionAccess, AppError> {
    let (problem, tier) = session_edit_guard(state, sid, user).await?;
    let lock = state.sessions.lock(sid).await?;
    Ok(SessionAccess {
        problem,
        tier,
        lock,
    })
}
