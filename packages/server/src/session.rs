//! Edit sessions: per-(problem, user) working copies of a problem.
//!
//! Each session is one JSON record on disk. A per-session mutex makes
//! every load-modify-dump a single critical section, so concurrent
//! requests against one session serialize instead of clobbering each
//! other. Sessions survive restarts; the manager rebuilds its index by
//! scanning the sessions directory.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::document::ProblemContent;
use crate::error::AppError;
use crate::repo::ProblemDoc;

/// Persisted session record: identity plus the working document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub problem_id: u64,
    pub user: String,
    /// Revision of the working copy; bumped on every commit. Clients poll
    /// this to notice concurrent edits of their own session.
    pub version: u64,
    /// Canonical problem version this copy was built from. Push succeeds
    /// only while this matches the canonical version.
    pub base_version: u64,
    pub content: ProblemContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error("session IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt session record: {0}")]
    Corrupt(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => AppError::NotFound(format!("Session {id} not found")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Index entry; identity never changes after creation.
struct SessionEntry {
    id: String,
    problem_id: u64,
    user: String,
    lock: Arc<Mutex<()>>,
}

/// Identity of a session without its document.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SessionBrief {
    pub id: String,
    pub user: String,
}

pub struct SessionManager {
    root: PathBuf,
    by_id: DashMap<String, Arc<SessionEntry>>,
    by_key: DashMap<(u64, String), String>,
    /// Serializes session creation so one (problem, user) pair can never
    /// race itself into two sessions.
    create_lock: Mutex<()>,
}

impl SessionManager {
    /// Open the manager rooted at `root`, rehydrating existing sessions.
    pub async fn open(root: PathBuf) -> Result<Self, SessionError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;

        let manager = Self {
            root,
            by_id: DashMap::new(),
            by_key: DashMap::new(),
            create_lock: Mutex::new(()),
        };

        let mut entries = fs::read_dir(&manager.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path().join("session.json");
            let bytes = match fs::read(&path).await {
                Ok(b) => b,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<SessionRecord>(&bytes) {
                Ok(record) => manager.index(&record),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping corrupt session record");
                }
            }
        }

        Ok(manager)
    }

    fn index(&self, record: &SessionRecord) {
        let key = (record.problem_id, record.user.clone());
        if self.by_key.contains_key(&key) {
            tracing::warn!(
                session = %record.id,
                problem = record.problem_id,
                user = %record.user,
                "duplicate session for problem/user pair, keeping the first"
            );
            return;
        }
        let entry = Arc::new(SessionEntry {
            id: record.id.clone(),
            problem_id: record.problem_id,
            user: record.user.clone(),
            lock: Arc::new(Mutex::new(())),
        });
        self.by_key.insert(key, record.id.clone());
        self.by_id.insert(record.id.clone(), entry);
    }

    fn record_path(&self, sid: &str) -> PathBuf {
        self.root.join(sid).join("session.json")
    }

    /// Session id for a (problem, user) pair, if one exists.
    pub fn find(&self, problem_id: u64, user: &str) -> Option<String> {
        self.by_key
            .get(&(problem_id, user.to_string()))
            .map(|sid| sid.clone())
    }

    /// Identity of a session without taking its lock.
    pub fn identify(&self, sid: &str) -> Option<(u64, String)> {
        self.by_id
            .get(sid)
            .map(|e| (e.problem_id, e.user.clone()))
    }

    /// All sessions of one problem.
    pub fn sessions_of(&self, problem_id: u64) -> Vec<SessionBrief> {
        let mut briefs: Vec<_> = self
            .by_id
            .iter()
            .filter(|e| e.problem_id == problem_id)
            .map(|e| SessionBrief {
                id: e.id.clone(),
                user: e.user.clone(),
            })
            .collect();
        briefs.sort_by(|a, b| a.user.cmp(&b.user));
        briefs
    }

    /// Take the session's lock and load its record.
    pub async fn lock(&self, sid: &str) -> Result<SessionLock, SessionError> {
        let entry = self
            .by_id
            .get(sid)
            .map(|e| e.clone())
            .ok_or_else(|| SessionError::NotFound(sid.to_string()))?;

        let guard = entry.lock.clone().lock_owned().await;

        let path = self.record_path(&entry.id);
        let bytes = match fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(sid.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let record =
            serde_json::from_slice(&bytes).map_err(|e| SessionError::Corrupt(e.to_string()))?;

        Ok(SessionLock {
            record,
            path,
            tmp_dir: self.root.join(".tmp"),
            _guard: guard,
        })
    }

    /// Fetch the user's session for a problem, creating or refreshing it
    /// from the canonical document.
    ///
    /// An existing session is reset to the canonical state (hot reload);
    /// a missing one is initialized. Either way the returned record
    /// mirrors the canonical content.
    pub async fn pull_or_init(
        &self,
        problem: &ProblemDoc,
        user: &str,
    ) -> Result<SessionRecord, SessionError> {
        if let Some(sid) = self.find(problem.id, user) {
            let mut lock = self.lock(&sid).await?;
            lock.reset_from(problem);
            lock.commit().await?;
            return Ok(lock.record().clone());
        }

        let _creating = self.create_lock.lock().await;
        // Re-check under the creation lock.
        if let Some(sid) = self.find(problem.id, user) {
            let mut lock = self.lock(&sid).await?;
            lock.reset_from(problem);
            lock.commit().await?;
            return Ok(lock.record().clone());
        }

        let now = Utc::now();
        let record = SessionRecord {
            id: Uuid::now_v7().to_string(),
            problem_id: problem.id,
            user: user.to_string(),
            version: 1,
            base_version: problem.version,
            content: problem.content.clone(),
            created_at: now,
            updated_at: now,
        };
        write_record(&self.root.join(".tmp"), &self.record_path(&record.id), &record).await?;
        self.index(&record);
        Ok(record)
    }
}

/// Exclusive handle on one session's record.
///
/// Mutations go through [`Self::content_mut`] and become durable on
/// [`Self::commit`]; dropping the lock without committing discards them.
pub struct SessionLock {
    record: SessionRecord,
    path: PathBuf,
    tmp_dir: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLock {
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn content(&self) -> &ProblemContent {
        &self.record.content
    }

    pub fn content_mut(&mut self) -> &mut ProblemContent {
        &mut self.record.content
    }

    /// Replace the working copy with the canonical document.
    pub fn reset_from(&mut self, problem: &ProblemDoc) {
        self.record.content = problem.content.clone();
        self.record.base_version = problem.version;
    }

    /// Mark the session as built on the given canonical version (after a
    /// successful push).
    pub fn set_base_version(&mut self, version: u64) {
        self.record.base_version = version;
    }

    /// Persist the record atomically, bumping its revision.
    pub async fn commit(&mut self) -> Result<(), SessionError> {
        self.record.version += 1;
        self.record.updated_at = Utc::now();
        write_record(&self.tmp_dir, &self.path, &self.record).await
    }
}

async fn write_record(
    tmp_dir: &PathBuf,
    path: &PathBuf,
    record: &SessionRecord,
) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let json =
        serde_json::to_vec_pretty(record).map_err(|e| SessionError::Corrupt(e.to_string()))?;
    let temp_path = tmp_dir.join(Uuid::new_v4().to_string());
    if let Err(e) = fs::write(&temp_path, &json).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}
