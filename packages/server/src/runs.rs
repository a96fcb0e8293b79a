//! Authoring runs: bookkeeping plus the in-process worker pool.
//!
//! A run is submitted as a fully resolved [`ExecJob`] and queued on a
//! bounded channel. Worker tasks pull jobs, hand them to the configured
//! [`Executor`], and write any produced data back into the session under
//! its lock. Run records live in memory only; they are cheap status
//! lines, not audit history.

use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, Utc};
use common::case::case_fingerprint;
use common::exec::{ExecArtifact, ExecJob, ExecReport, Executor, JobKind};
use common::storage::BlobStore;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, mpsc};

use crate::document::{CaseEntry, DEFAULT_CASE_POINT};
use crate::error::AppError;
use crate::quota;
use crate::session::SessionManager;

/// Finished runs beyond this count are evicted per session, oldest first.
const RUN_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Status line for one submitted run.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct RunRecord {
    pub id: String,
    pub session_id: String,
    pub user: String,
    pub kind: JobKind,
    /// Human-facing description, e.g. "Validate 3 cases".
    pub label: String,
    pub status: RunStatus,
    /// Backend verdict once the run finishes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct QueuedRun {
    run_id: String,
    session_id: String,
    job: ExecJob,
}

pub struct RunService {
    records: DashMap<String, RunRecord>,
    queue: mpsc::Sender<QueuedRun>,
    /// Shared by the workers; also keeps the channel open when the pool
    /// is configured with zero workers.
    inbox: Arc<Mutex<mpsc::Receiver<QueuedRun>>>,
    executor: Arc<dyn Executor>,
}

impl RunService {
    /// Build the service and spawn its worker tasks.
    pub fn start(
        executor: Arc<dyn Executor>,
        sessions: Arc<SessionManager>,
        blobs: Arc<dyn BlobStore>,
        quota_limit: u64,
        workers: usize,
        queue_capacity: usize,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let service = Arc::new(Self {
            records: DashMap::new(),
            queue: tx,
            inbox: Arc::new(Mutex::new(rx)),
            executor,
        });

        for worker in 0..workers {
            tokio::spawn(run_worker(
                worker,
                service.clone(),
                sessions.clone(),
                blobs.clone(),
                quota_limit,
            ));
        }

        service
    }

    /// Queue a resolved job against a session. The job id becomes the
    /// run id, returned to the caller for status polling.
    pub fn submit(
        &self,
        session_id: &str,
        user: &str,
        label: impl Into<String>,
        job: ExecJob,
    ) -> Result<String, AppError> {
        if !self.executor.accepts(job.kind) {
            return Err(AppError::Validation(format!(
                "No execution backend accepts {} jobs",
                job.kind
            )));
        }

        let run_id = job.id.clone();
        let now = Utc::now();
        self.prune_session(session_id);
        self.records.insert(
            run_id.clone(),
            RunRecord {
                id: run_id.clone(),
                session_id: session_id.to_string(),
                user: user.to_string(),
                kind: job.kind,
                label: label.into(),
                status: RunStatus::Pending,
                message: None,
                created_at: now,
                updated_at: now,
            },
        );

        let queued = QueuedRun {
            run_id: run_id.clone(),
            session_id: session_id.to_string(),
            job,
        };
        if self.queue.try_send(queued).is_err() {
            self.records.remove(&run_id);
            return Err(AppError::Busy(
                "Run queue is full, try again shortly".to_string(),
            ));
        }

        tracing::info!(run = %run_id, session = session_id, "run queued");
        Ok(run_id)
    }

    /// Look up a run. Runs are only visible to their submitter.
    pub fn get(&self, run_id: &str, user: &str) -> Result<RunRecord, AppError> {
        self.records
            .get(run_id)
            .filter(|r| r.user == user)
            .map(|r| r.clone())
            .ok_or_else(|| AppError::NotFound(format!("Run {run_id} not found")))
    }

    /// Runs the user submitted against one session, newest first.
    pub fn list_for_session(&self, session_id: &str, user: &str) -> Vec<RunRecord> {
        let mut runs: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.session_id == session_id && r.user == user)
            .map(|r| r.clone())
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        runs.truncate(RUN_HISTORY_LIMIT);
        runs
    }

    /// All runs the user submitted, any session, newest first.
    pub fn list_for_user(&self, user: &str) -> Vec<RunRecord> {
        let mut runs: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.user == user)
            .map(|r| r.clone())
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        runs.truncate(RUN_HISTORY_LIMIT);
        runs
    }

    fn set_status(&self, run_id: &str, status: RunStatus, message: Option<String>) {
        if let Some(mut record) = self.records.get_mut(run_id) {
            record.status = status;
            record.message = message;
            record.updated_at = Utc::now();
        }
    }

    /// Make room for one more record by evicting the oldest finished runs
    /// of the session. In-flight runs are never evicted.
    fn prune_session(&self, session_id: &str) {
        let mut session_runs: Vec<(String, RunStatus, DateTime<Utc>)> = self
            .records
            .iter()
            .filter(|r| r.session_id == session_id)
            .map(|r| (r.id.clone(), r.status, r.created_at))
            .collect();
        if session_runs.len() < RUN_HISTORY_LIMIT {
            return;
        }
        session_runs.sort_by(|a, b| a.2.cmp(&b.2));
        let mut excess = session_runs.len() + 1 - RUN_HISTORY_LIMIT;
        for (id, status, _) in session_runs {
            if excess == 0 {
                break;
            }
            if status.is_finished() {
                self.records.remove(&id);
                excess -= 1;
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    service: Arc<RunService>,
    sessions: Arc<SessionManager>,
    blobs: Arc<dyn BlobStore>,
    quota_limit: u64,
) {
    tracing::debug!(worker, "run worker started");
    loop {
        let queued = {
            let mut inbox = service.inbox.lock().await;
            inbox.recv().await
        };
        let Some(QueuedRun {
            run_id,
            session_id,
            job,
        }) = queued
        else {
            tracing::debug!(worker, "run queue closed, worker exiting");
            break;
        };

        let kind = job.kind;
        service.set_status(&run_id, RunStatus::Running, None);
        tracing::info!(worker, run = %run_id, %kind, "run started");

        match service.executor.execute(job).await {
            Ok(report) => {
                finish_run(
                    &service,
                    &session_id,
                    &run_id,
                    report,
                    &sessions,
                    blobs.as_ref(),
                    quota_limit,
                )
                .await;
            }
            Err(e) => {
                tracing::error!(worker, run = %run_id, error = %e, "execution backend error");
                service.set_status(&run_id, RunStatus::Failed, Some(e.to_string()));
            }
        }
    }
}

async fn finish_run(
    service: &RunService,
    session_id: &str,
    run_id: &str,
    report: ExecReport,
    sessions: &SessionManager,
    blobs: &dyn BlobStore,
    quota_limit: u64,
) {
    let message = compose_message(&report);
    if !report.success {
        service.set_status(run_id, RunStatus::Failed, Some(message));
        return;
    }

    if !report.artifacts.is_empty() {
        match apply_artifacts(session_id, &report.artifacts, sessions, blobs, quota_limit).await {
            Ok(applied) => {
                tracing::info!(run = %run_id, applied, "run artifacts applied");
            }
            Err(e) => {
                tracing::error!(run = %run_id, error = %e, "failed to store run results");
                service.set_status(
                    run_id,
                    RunStatus::Failed,
                    Some(format!("Failed to store run results: {e}")),
                );
                return;
            }
        }
    }

    service.set_status(run_id, RunStatus::Succeeded, Some(message));
}

/// Fold per-case verdicts into the backend's summary line.
fn compose_message(report: &ExecReport) -> String {
    let mut message = report.message.clone();
    let failures: Vec<String> = report
        .case_results
        .iter()
        .filter(|v| !v.passed)
        .map(|v| format!("case {}: {}", v.fingerprint.short(), v.detail))
        .collect();
    if failures.is_empty() {
        return message;
    }
    if !message.is_empty() {
        message.push_str("; ");
    }
    let shown = failures.len().min(5);
    message.push_str(&failures[..shown].join("; "));
    if failures.len() > shown {
        message.push_str(&format!("; and {} more", failures.len() - shown));
    }
    message
}

/// Write produced data back into the session, under its lock.
///
/// The session may have moved on while the run was in flight; outputs for
/// cases no longer present are dropped, and inputs that already exist are
/// left untouched.
async fn apply_artifacts(
    session_id: &str,
    artifacts: &[ExecArtifact],
    sessions: &SessionManager,
    blobs: &dyn BlobStore,
    quota_limit: u64,
) -> anyhow::Result<usize> {
    let mut lock = sessions.lock(session_id).await?;

    let incoming: u64 = artifacts
        .iter()
        .map(|a| match a {
            ExecArtifact::CaseOutput { output, .. } => output.len() as u64,
            ExecArtifact::NewInput { input } => input.len() as u64,
        })
        .sum();
    let used = quota::volume_used(blobs, lock.content()).await?;
    if used.saturating_add(incoming) > quota_limit {
        bail!(
            "storage quota exceeded ({used} of {quota_limit} bytes in use, {incoming} more produced)"
        );
    }

    let mut applied = 0usize;
    for artifact in artifacts {
        match artifact {
            ExecArtifact::CaseOutput {
                fingerprint,
                output,
            } => {
                let Some(old) = lock.content().case(fingerprint).cloned() else {
                    tracing::warn!(
                        session = session_id,
                        case = %fingerprint.short(),
                        "dropping output for a case no longer in the session"
                    );
                    continue;
                };
                let input = blobs.get(&old.input).await?;
                let new_fp = case_fingerprint(&input, Some(output));
                if new_fp == *fingerprint {
                    continue;
                }
                let output_hash = blobs.put(output).await?;
                lock.content_mut().remove_case(fingerprint);
                // A collision here means an identical case already exists;
                // the two merge into one entry.
                lock.content_mut().insert_case(
                    new_fp,
                    CaseEntry {
                        order: old.order,
                        point: old.point,
                        pretest: old.pretest,
                        sample: old.sample,
                        input: old.input,
                        output: Some(output_hash),
                        well_form: old.well_form,
                    },
                );
                applied += 1;
            }
            ExecArtifact::NewInput { input } => {
                let new_fp = case_fingerprint(input, None);
                if lock.content().case(&new_fp).is_some() {
                    continue;
                }
                let input_hash = blobs.put(input).await?;
                let order = lock.content().next_order();
                lock.content_mut().insert_case(
                    new_fp,
                    CaseEntry {
                        order,
                        point: DEFAULT_CASE_POINT,
                        pretest: false,
                        sample: false,
                        input: input_hash,
                        output: None,
                        well_form: false,
                    },
                );
                applied += 1;
            }
        }
    }

    if applied > 0 {
        lock.commit().await?;
    }
    Ok(applied)
}
