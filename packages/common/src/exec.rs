//! Execution-backend contract for authoring runs.
//!
//! The server resolves session state (program sources, case data, limits)
//! into an [`ExecJob`] at submission time and hands it to an [`Executor`].
//! How the job actually runs (sandbox, container, remote judge) is the
//! executor's business; the server only consumes the [`ExecReport`].

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::ContentHash;

/// The part a program plays inside one job.
///
/// This is per-job, not per-registry: the same source can be the tested
/// [`Self::Solution`] in one run and the reference [`Self::Model`] in the
/// next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramRole {
    Checker,
    Validator,
    Generator,
    Interactor,
    Model,
    /// The program under test in check and stress jobs.
    Solution,
}

impl ProgramRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checker => "checker",
            Self::Validator => "validator",
            Self::Generator => "generator",
            Self::Interactor => "interactor",
            Self::Model => "model",
            Self::Solution => "solution",
        }
    }
}

impl std::fmt::Display for ProgramRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of work an authoring run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Run a validator over case inputs.
    Validate,
    /// Run a model solution to produce case outputs.
    RunOutput,
    /// Run a solution and judge it with a checker.
    Check,
    /// Run a generator to produce new case inputs.
    Generate,
    /// Stress a solution against a generator for a bounded duration.
    Stress,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::RunOutput => "run_output",
            Self::Check => "check",
            Self::Generate => "generate",
            Self::Stress => "stress",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A program source resolved from the session at submission time.
#[derive(Debug, Clone)]
pub struct ExecProgram {
    pub role: ProgramRole,
    /// Filename inside the session (e.g. "checker.cpp").
    pub filename: String,
    /// Language tag (e.g. "cpp", "python").
    pub language: String,
    /// Full source text.
    pub source: String,
}

/// Test-case data snapshotted into a job.
#[derive(Debug, Clone)]
pub struct ExecCase {
    /// Identity of the case inside the session.
    pub fingerprint: ContentHash,
    /// Input bytes.
    pub input: Vec<u8>,
    /// Output bytes, when the case has one.
    pub output: Option<Vec<u8>>,
}

/// A fully resolved execution job.
///
/// Jobs carry everything the backend needs; executors never reach back
/// into sessions or storage.
#[derive(Debug, Clone)]
pub struct ExecJob {
    /// Job identifier (UUID).
    pub id: String,
    pub kind: JobKind,
    /// Time limit per run in milliseconds.
    pub time_limit_ms: u64,
    /// Memory limit per run in megabytes.
    pub memory_limit_mb: u64,
    /// Programs involved, with their roles.
    pub programs: Vec<ExecProgram>,
    /// Cases involved. Empty for pure generation jobs.
    pub cases: Vec<ExecCase>,
    /// Free-form argument string for generators.
    pub param: Option<String>,
    /// Wall-clock budget for stress jobs, in seconds.
    pub duration_secs: Option<u64>,
}

impl ExecJob {
    /// Create an empty job of the given kind with a generated id.
    pub fn new(kind: JobKind, time_limit_ms: u64, memory_limit_mb: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            time_limit_ms,
            memory_limit_mb,
            programs: Vec::new(),
            cases: Vec::new(),
            param: None,
            duration_secs: None,
        }
    }

    /// Find the program playing the given role, if present.
    pub fn program(&self, role: ProgramRole) -> Option<&ExecProgram> {
        self.programs.iter().find(|p| p.role == role)
    }

    /// Fingerprints of all cases carried by this job.
    pub fn case_fingerprints(&self) -> Vec<ContentHash> {
        self.cases.iter().map(|c| c.fingerprint).collect()
    }
}

/// Per-case result detail.
#[derive(Debug, Clone)]
pub struct CaseVerdict {
    pub fingerprint: ContentHash,
    pub passed: bool,
    pub detail: String,
}

/// Data produced by a job that the server applies back to the session.
#[derive(Debug, Clone)]
pub enum ExecArtifact {
    /// Output bytes produced for an existing case.
    CaseOutput {
        fingerprint: ContentHash,
        output: Vec<u8>,
    },
    /// A brand-new case input (generator or stress counterexample).
    NewInput { input: Vec<u8> },
}

/// What a handler reports back, minus the job identity.
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub success: bool,
    pub message: String,
    pub case_results: Vec<CaseVerdict>,
    pub artifacts: Vec<ExecArtifact>,
}

impl ExecOutcome {
    pub fn passed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<ExecArtifact>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

/// Result of executing a job.
#[derive(Debug, Clone)]
pub struct ExecReport {
    pub job_id: String,
    pub success: bool,
    pub message: String,
    pub case_results: Vec<CaseVerdict>,
    pub artifacts: Vec<ExecArtifact>,
}

impl ExecReport {
    pub fn from_outcome(job_id: impl Into<String>, outcome: ExecOutcome) -> Self {
        Self {
            job_id: job_id.into(),
            success: outcome.success,
            message: outcome.message,
            case_results: outcome.case_results,
            artifacts: outcome.artifacts,
        }
    }

    /// A failed report with no per-case detail.
    pub fn failed(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            success: false,
            message: message.into(),
            case_results: Vec::new(),
            artifacts: Vec::new(),
        }
    }
}

/// Execution backend seam.
///
/// Implementations must never panic on malformed jobs; anything that goes
/// wrong is reported through a failed [`ExecReport`] or an error, both of
/// which the caller records against the run.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Whether this executor can handle the given job kind.
    fn accepts(&self, kind: JobKind) -> bool;

    async fn execute(&self, job: ExecJob) -> Result<ExecReport>;
}

type JobHandlerFn = Box<dyn Fn(&ExecJob) -> Result<ExecOutcome> + Send + Sync>;

/// In-process executor backed by registered closures.
///
/// Used by tests and by deployments that bring their own handlers. Handler
/// errors become failed reports rather than bubbling up, so one bad job
/// cannot take down the run loop.
pub struct NativeExecutor {
    handlers: DashMap<JobKind, JobHandlerFn>,
}

impl NativeExecutor {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    pub fn register_handler<F>(&self, kind: JobKind, handler: F)
    where
        F: Fn(&ExecJob) -> Result<ExecOutcome> + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }
}

impl Default for NativeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for NativeExecutor {
    fn accepts(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    async fn execute(&self, job: ExecJob) -> Result<ExecReport> {
        let job_id = job.id.clone();
        match self.handlers.get(&job.kind) {
            Some(handler) => match handler(&job) {
                Ok(outcome) => Ok(ExecReport::from_outcome(job_id, outcome)),
                Err(e) => Ok(ExecReport::failed(job_id, e.to_string())),
            },
            None => Ok(ExecReport::failed(
                job_id,
                format!("no handler registered for job kind {}", job.kind),
            )),
        }
    }
}
