//! Canonical problem storage.
//!
//! Sessions pull from and push to this store. The trait is the seam for
//! alternative backends; the filesystem implementation keeps one JSON
//! record per problem with atomic replacement, so readers never observe a
//! half-written document.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

use crate::access::{AccessMap, AccessTier};
use crate::document::ProblemContent;
use crate::error::AppError;

/// A published problem with its access records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDoc {
    pub id: u64,
    /// Bumped on every publish. Sessions compare against this to detect
    /// stale pushes.
    pub version: u64,
    pub managers: AccessMap,
    pub content: ProblemContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("problem {0} not found")]
    NotFound(u64),
    #[error("version conflict: pushed from {expected}, canonical is {actual}")]
    VersionConflict { expected: u64, actual: u64 },
    #[error("repository IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt problem record: {0}")]
    Corrupt(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => AppError::NotFound(format!("Problem {id} not found")),
            RepoError::VersionConflict { .. } => AppError::Conflict(format!(
                "{err}; pull the latest problem before pushing"
            )),
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Canonical problem store.
///
/// Implementations serialize mutations per problem; concurrent publishes
/// are decided by the version check.
#[async_trait]
pub trait ProblemStore: Send + Sync {
    /// Create a problem with the given alias, owned by `admin`.
    ///
    /// The title defaults to "Problem #<id>".
    async fn create(&self, alias: String, admin: String) -> Result<ProblemDoc, RepoError>;

    async fn get(&self, id: u64) -> Result<ProblemDoc, RepoError>;

    /// Replace the problem content, succeeding only when the caller built
    /// on the current version. Returns the new version.
    async fn publish(
        &self,
        id: u64,
        expected_version: u64,
        content: ProblemContent,
    ) -> Result<u64, RepoError>;

    /// Replace the access records. Content and version are untouched, so
    /// access changes never invalidate open sessions.
    async fn set_access(&self, id: u64, managers: AccessMap) -> Result<(), RepoError>;

    /// Problems the user has any access record for, newest first.
    async fn list_for_user(&self, user: &str) -> Result<Vec<ProblemDoc>, RepoError>;
}

/// Filesystem-backed problem store: `{root}/{id}/problem.json`.
pub struct FsProblemStore {
    root: PathBuf,
    locks: DashMap<u64, Arc<Mutex<()>>>,
    next_id: AtomicU64,
}

impl FsProblemStore {
    /// Open the store, creating directories as needed and resuming id
    /// allocation after the highest existing problem.
    pub async fn open(root: PathBuf) -> Result<Self, RepoError> {
        fs::create_dir_all(&root).await?;
        fs::create_dir_all(root.join(".tmp")).await?;

        let mut max_id = 0u64;
        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str()
                && let Ok(id) = name.parse::<u64>()
            {
                max_id = max_id.max(id);
            }
        }

        Ok(Self {
            root,
            locks: DashMap::new(),
            next_id: AtomicU64::new(max_id),
        })
    }

    fn doc_path(&self, id: u64) -> PathBuf {
        self.root.join(id.to_string()).join("problem.json")
    }

    fn lock_for(&self, id: u64) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_doc(&self, id: u64) -> Result<ProblemDoc, RepoError> {
        let path = self.doc_path(id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepoError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| RepoError::Corrupt(e.to_string()))
    }

    async fn write_doc(&self, doc: &ProblemDoc) -> Result<(), RepoError> {
        let path = self.doc_path(doc.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(doc).map_err(|e| RepoError::Corrupt(e.to_string()))?;
        let temp_path = self.root.join(".tmp").join(uuid::Uuid::new_v4().to_string());
        if let Err(e) = fs::write(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ProblemStore for FsProblemStore {
    async fn create(&self, alias: String, admin: String) -> Result<ProblemDoc, RepoError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut content = ProblemContent::new(alias, String::new());
        content.title = format!("Problem #{id}");

        let mut managers = AccessMap::new();
        managers.insert(admin, AccessTier::Admin);

        let now = Utc::now();
        let doc = ProblemDoc {
            id,
            version: 1,
            managers,
            content,
            created_at: now,
            updated_at: now,
        };
        self.write_doc(&doc).await?;
        Ok(doc)
    }

    async fn get(&self, id: u64) -> Result<ProblemDoc, RepoError> {
        self.read_doc(id).await
    }

    async fn publish(
        &self,
        id: u64,
        expected_version: u64,
        content: ProblemContent,
    ) -> Result<u64, RepoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut doc = self.read_doc(id).await?;
        if doc.version != expected_version {
            return Err(RepoError::VersionConflict {
                expected: expected_version,
                actual: doc.version,
            });
        }

        doc.version += 1;
        doc.content = content;
        doc.updated_at = Utc::now();
        self.write_doc(&doc).await?;
        Ok(doc.version)
    }

    async fn set_access(&self, id: u64, managers: AccessMap) -> Result<(), RepoError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut doc = self.read_doc(id).await?;
        doc.managers = managers;
        doc.updated_at = Utc::now();
        self.write_doc(&doc).await
    }

    async fn list_for_user(&self, user: &str) -> Result<Vec<ProblemDoc>, RepoError> {
        let mut docs = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<u64>().ok()) else {
                continue;
            };
            match self.read_doc(id).await {
                Ok(doc) => {
                    if doc.managers.contains_key(user) {
                        docs.push(doc);
                    }
                }
                Err(RepoError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(docs)
    }
}
