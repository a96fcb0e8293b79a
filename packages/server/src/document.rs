//! The authoring document: everything that defines a problem.
//!
//! [`ProblemContent`] is the unit that moves between the canonical store
//! and edit sessions. All operations here are pure; persistence and
//! locking live in [`crate::session`] and [`crate::repo`].

use std::collections::{BTreeMap, BTreeSet};

use common::storage::ContentHash;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIME_LIMIT_MS: u64 = 2000;
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 256;

/// Score weight given to newly entered cases.
pub const DEFAULT_CASE_POINT: u32 = 10;

pub const MIN_TIME_LIMIT_MS: u64 = 100;
pub const MAX_TIME_LIMIT_MS: u64 = 30_000;
pub const MIN_MEMORY_LIMIT_MB: u64 = 16;
pub const MAX_MEMORY_LIMIT_MB: u64 = 4096;

/// One test case tracked by the document.
///
/// The key in [`ProblemContent::cases`] is the case fingerprint; the entry
/// stores judge metadata plus references to the input/output blobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseEntry {
    /// 1-based position in the judge order. 0 parks the case as unused.
    #[serde(default)]
    pub order: u32,
    /// Score weight.
    #[serde(default)]
    pub point: u32,
    #[serde(default)]
    pub pretest: bool,
    #[serde(default)]
    pub sample: bool,
    pub input: ContentHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ContentHash>,
    /// Whether the case data was normalized when it entered the document.
    #[serde(default)]
    pub well_form: bool,
}

impl CaseEntry {
    pub fn used(&self) -> bool {
        self.order > 0
    }
}

/// Registry classification of a program file.
///
/// `Regular` programs carry no special duty; they are the candidate
/// solutions that check and stress runs put under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgramCategory {
    Checker,
    Validator,
    Generator,
    Interactor,
    Model,
    Regular,
}

impl ProgramCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checker => "checker",
            Self::Validator => "validator",
            Self::Generator => "generator",
            Self::Interactor => "interactor",
            Self::Model => "model",
            Self::Regular => "regular",
        }
    }
}

impl std::fmt::Display for ProgramCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A program source registered in the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub category: ProgramCategory,
    /// Language tag (e.g. "cpp", "python").
    pub language: String,
    /// Full source text.
    pub code: String,
}

/// Meta fields accepted by a meta save.
#[derive(Debug, Clone)]
pub struct MetaUpdate {
    pub alias: String,
    pub title: String,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
    pub source: String,
    pub interactive: bool,
    pub checker: Option<String>,
    pub interactor: Option<String>,
    pub validator: Option<String>,
    pub model: Option<String>,
}

/// Problem aliases are short lowercase identifiers, `[a-z0-9]{2,30}`.
pub fn validate_alias(alias: &str) -> Result<(), String> {
    let ok = (2..=30).contains(&alias.len())
        && alias
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err("Alias must be 2-30 lowercase letters or digits".into())
    }
}

fn validate_limits(time_limit_ms: u64, memory_limit_mb: u64) -> Result<(), String> {
    if !(MIN_TIME_LIMIT_MS..=MAX_TIME_LIMIT_MS).contains(&time_limit_ms) {
        return Err(format!(
            "Time limit must be between {MIN_TIME_LIMIT_MS} and {MAX_TIME_LIMIT_MS} ms"
        ));
    }
    if !(MIN_MEMORY_LIMIT_MB..=MAX_MEMORY_LIMIT_MB).contains(&memory_limit_mb) {
        return Err(format!(
            "Memory limit must be between {MIN_MEMORY_LIMIT_MB} and {MAX_MEMORY_LIMIT_MB} MB"
        ));
    }
    Ok(())
}

/// Normalize an optional role binding: empty strings mean unbound.
fn normalize_role(role: Option<String>) -> Option<String> {
    role.filter(|s| !s.trim().is_empty())
}

/// The full definition of a problem: meta, role bindings, cases, programs,
/// statements and support files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemContent {
    pub alias: String,
    pub title: String,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
    /// Provenance note (where the problem came from).
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub checker: Option<String>,
    #[serde(default)]
    pub interactor: Option<String>,
    #[serde(default)]
    pub validator: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Cases keyed by fingerprint.
    #[serde(default)]
    pub cases: BTreeMap<ContentHash, CaseEntry>,
    /// Programs keyed by filename.
    #[serde(default)]
    pub programs: BTreeMap<String, ProgramEntry>,
    /// Statement texts keyed by filename.
    #[serde(default)]
    pub statements: BTreeMap<String, String>,
    /// Uploaded support files: name -> blob.
    #[serde(default)]
    pub files: BTreeMap<String, ContentHash>,
}

impl ProblemContent {
    pub fn new(alias: String, title: String) -> Self {
        Self {
            alias,
            title,
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            source: String::new(),
            interactive: false,
            checker: None,
            interactor: None,
            validator: None,
            model: None,
            cases: BTreeMap::new(),
            programs: BTreeMap::new(),
            statements: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Role bindings in a fixed order, for validation and display.
    pub fn roles(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("checker", self.checker.as_deref()),
            ("interactor", self.interactor.as_deref()),
            ("validator", self.validator.as_deref()),
            ("model", self.model.as_deref()),
        ]
    }

    /// The filename bound to a role this program plays, if any.
    pub fn role_of(&self, filename: &str) -> Option<&'static str> {
        self.roles()
            .into_iter()
            .find(|(_, bound)| *bound == Some(filename))
            .map(|(role, _)| role)
    }

    /// Check that every bound role points at an existing program.
    pub fn validate_roles(&self) -> Result<(), String> {
        for (role, bound) in self.roles() {
            if let Some(filename) = bound
                && !self.programs.contains_key(filename)
            {
                return Err(format!("Program file {filename} bound as {role} does not exist"));
            }
        }
        Ok(())
    }

    /// Apply a meta save.
    ///
    /// Everything is validated before anything is written, so a rejected
    /// update leaves the document exactly as it was.
    pub fn update_meta(&mut self, meta: MetaUpdate) -> Result<(), String> {
        validate_alias(&meta.alias)?;
        validate_limits(meta.time_limit_ms, meta.memory_limit_mb)?;

        let checker = normalize_role(meta.checker);
        let interactor = normalize_role(meta.interactor);
        let validator = normalize_role(meta.validator);
        let model = normalize_role(meta.model);
        for bound in [&checker, &interactor, &validator, &model].into_iter().flatten() {
            if !self.programs.contains_key(bound) {
                return Err(format!("Program file {bound} does not exist"));
            }
        }

        self.alias = meta.alias;
        self.title = meta.title;
        self.time_limit_ms = meta.time_limit_ms;
        self.memory_limit_mb = meta.memory_limit_mb;
        self.source = meta.source;
        self.interactive = meta.interactive;
        self.checker = checker;
        self.interactor = interactor;
        self.validator = validator;
        self.model = model;
        Ok(())
    }

    // ----- cases -----

    /// Next free slot at the end of the judge order.
    pub fn next_order(&self) -> u32 {
        self.cases.values().map(|c| c.order).max().unwrap_or(0) + 1
    }

    /// Insert a case unless its fingerprint is already present.
    ///
    /// Entering identical data twice is a no-op; the existing entry keeps
    /// its order and flags.
    pub fn insert_case(&mut self, fingerprint: ContentHash, entry: CaseEntry) -> bool {
        if self.cases.contains_key(&fingerprint) {
            return false;
        }
        self.cases.insert(fingerprint, entry);
        true
    }

    /// Remove a case entry. Absent fingerprints are fine.
    pub fn remove_case(&mut self, fingerprint: &ContentHash) -> Option<CaseEntry> {
        self.cases.remove(fingerprint)
    }

    pub fn case(&self, fingerprint: &ContentHash) -> Option<&CaseEntry> {
        self.cases.get(fingerprint)
    }

    /// Replace the judge order wholesale.
    ///
    /// Cases in `ordered` get sequential 1-based orders, cases in `unused`
    /// get 0, and fingerprints in neither list keep their current order.
    /// Unknown fingerprints are rejected.
    pub fn reorder_cases(
        &mut self,
        ordered: &[ContentHash],
        unused: &[ContentHash],
    ) -> Result<(), String> {
        let mut conclusion: BTreeMap<ContentHash, u32> = BTreeMap::new();
        for (idx, fp) in ordered.iter().enumerate() {
            conclusion.insert(*fp, idx as u32 + 1);
        }
        for fp in unused {
            conclusion.insert(*fp, 0);
        }

        for fp in conclusion.keys() {
            if !self.cases.contains_key(fp) {
                return Err(format!("Case {} does not exist", fp.short()));
            }
        }
        for (fp, order) in conclusion {
            if let Some(entry) = self.cases.get_mut(&fp) {
                entry.order = order;
            }
        }
        Ok(())
    }

    pub fn set_case_point(&mut self, fingerprint: &ContentHash, point: u32) -> Result<(), String> {
        match self.cases.get_mut(fingerprint) {
            Some(entry) => {
                entry.point = point;
                Ok(())
            }
            None => Err(format!("Case {} does not exist", fingerprint.short())),
        }
    }

    /// Flip the pretest flag; returns the new value.
    pub fn toggle_pretest(&mut self, fingerprint: &ContentHash) -> Result<bool, String> {
        match self.cases.get_mut(fingerprint) {
            Some(entry) => {
                entry.pretest = !entry.pretest;
                Ok(entry.pretest)
            }
            None => Err(format!("Case {} does not exist", fingerprint.short())),
        }
    }

    /// Flip the sample flag; returns the new value.
    pub fn toggle_sample(&mut self, fingerprint: &ContentHash) -> Result<bool, String> {
        match self.cases.get_mut(fingerprint) {
            Some(entry) => {
                entry.sample = !entry.sample;
                Ok(entry.sample)
            }
            None => Err(format!("Case {} does not exist", fingerprint.short())),
        }
    }

    /// Cases in judge order (order > 0 only).
    pub fn ordered_cases(&self) -> Vec<(ContentHash, &CaseEntry)> {
        let mut used: Vec<_> = self
            .cases
            .iter()
            .filter(|(_, c)| c.used())
            .map(|(fp, c)| (*fp, c))
            .collect();
        used.sort_by_key(|(_, c)| c.order);
        used
    }

    pub fn case_count(&self) -> usize {
        self.cases.values().filter(|c| c.used()).count()
    }

    pub fn pretest_count(&self) -> usize {
        self.cases.values().filter(|c| c.pretest).count()
    }

    pub fn sample_count(&self) -> usize {
        self.cases.values().filter(|c| c.sample).count()
    }

    // ----- programs -----

    /// Register a new program. Fails if the filename is taken.
    pub fn create_program(&mut self, filename: String, entry: ProgramEntry) -> Result<(), String> {
        if self.programs.contains_key(&filename) {
            return Err(format!("Program file {filename} already exists"));
        }
        self.programs.insert(filename, entry);
        Ok(())
    }

    /// Replace the program registered as `raw_filename`, possibly renaming
    /// it. Role bindings are left alone; a binding pointing at the old name
    /// dangles until the next meta save fixes it.
    pub fn replace_program(
        &mut self,
        raw_filename: &str,
        filename: String,
        entry: ProgramEntry,
    ) -> Result<(), String> {
        if !self.programs.contains_key(raw_filename) {
            return Err(format!("Program file {raw_filename} does not exist"));
        }
        if raw_filename != filename && self.programs.contains_key(&filename) {
            return Err(format!("Program file {filename} already exists"));
        }
        self.programs.remove(raw_filename);
        self.programs.insert(filename, entry);
        Ok(())
    }

    /// Insert-or-overwrite, used by builtin imports.
    pub fn import_program(&mut self, filename: String, entry: ProgramEntry) {
        self.programs.insert(filename, entry);
    }

    /// Remove a program. Absent filenames are fine.
    pub fn remove_program(&mut self, filename: &str) -> bool {
        self.programs.remove(filename).is_some()
    }

    // ----- storage accounting -----

    /// Every blob this document references (case data and support files).
    pub fn referenced_blobs(&self) -> BTreeSet<ContentHash> {
        let mut set = BTreeSet::new();
        for case in self.cases.values() {
            set.insert(case.input);
            if let Some(out) = case.output {
                set.insert(out);
            }
        }
        set.extend(self.files.values().copied());
        set
    }
}
