//! Startup resume: rebuild "next step to execute" from the resume pointer and
//! the checkpoint markers left by completed steps.
//!
//! Nothing in here blocks startup. An unreadable pointer means there is
//! nothing to resume; a plan that has vanished is reported, not invented.

use crate::core::error::EchoError;
use crate::core::store::Store;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// `step-<N>.ok`, the marker naming contract shared with the step executor.
static CHECKPOINT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^step-(.+)\.ok$").unwrap());

/// The resume pointer document (`echo_state/state.json`), kept exactly as
/// read. Only `current_plan` is interpreted.
pub type ResumeState = Map<String, Value>;

/// Plan named by the pointer, if it is a non-empty string.
pub fn current_plan(state: &ResumeState) -> Option<&str> {
    state
        .get("current_plan")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumePayload {
    pub state: ResumeState,
    pub plan_file: PathBuf,
    pub completed_steps: Vec<u64>,
    pub next_step: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ResumeOutcome {
    /// Pointer missing or unreadable.
    NoState,
    /// Pointer present with nothing to resume.
    Idle { state: ResumeState },
    /// Pointer names a plan whose file is not on disk.
    PlanMissing { state: ResumeState, plan: String },
    Resume(ResumePayload),
}

impl ResumeOutcome {
    pub fn state(&self) -> Option<&ResumeState> {
        match self {
            ResumeOutcome::NoState => None,
            ResumeOutcome::Idle { state } | ResumeOutcome::PlanMissing { state, .. } => {
                Some(state)
            }
            ResumeOutcome::Resume(payload) => Some(&payload.state),
        }
    }

    pub fn payload(&self) -> Option<&ResumePayload> {
        match self {
            ResumeOutcome::Resume(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Step number encoded in a checkpoint marker's file name, if it follows the
/// `step-<N>.ok` convention.
pub fn parse_checkpoint_name(name: &str) -> Option<u64> {
    let caps = CHECKPOINT_NAME.captures(name)?;
    caps.get(1)?.as_str().parse::<u64>().ok()
}

/// Step numbers of every well-formed marker in `dir`, sorted and deduplicated.
/// A missing directory has no markers; names that do not parse are skipped.
pub fn scan_checkpoints(dir: &Path) -> Result<Vec<u64>, EchoError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut steps = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match parse_checkpoint_name(name) {
            Some(step) => steps.push(step),
            None if name.starts_with("step-") => {
                tracing::warn!(marker = name, "ignoring unparsable checkpoint marker");
            }
            None => {}
        }
    }
    steps.sort_unstable();
    steps.dedup();
    Ok(steps)
}

/// One after the highest completed step, or 1 when nothing has completed.
/// `None` when the highest step has no successor.
pub fn next_step(completed: &[u64]) -> Option<u64> {
    match completed.iter().max() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}

pub fn read_state(path: &Path) -> Result<ResumeState, EchoError> {
    let raw = fs::read_to_string(path)?;
    match serde_json::from_str::<Value>(&raw)? {
        Value::Object(state) => Ok(state),
        other => Err(EchoError::ValidationError(format!(
            "{}: state document must be a JSON object, got {}",
            path.display(),
            other
        ))),
    }
}

/// Run the reconciliation once against `store`.
pub fn reconcile(store: &Store) -> ResumeOutcome {
    let state_path = store.state_path();
    if !state_path.exists() {
        tracing::warn!(path = %state_path.display(), "resume skipped: no state document");
        return ResumeOutcome::NoState;
    }

    let state = match read_state(&state_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(
                path = %state_path.display(),
                error = %e,
                "resume skipped: could not read state"
            );
            return ResumeOutcome::NoState;
        }
    };

    let plan_name = match current_plan(&state) {
        Some(name) => name.to_string(),
        None => return ResumeOutcome::Idle { state },
    };

    let plan_file = store.plans_dir().join(&plan_name);
    if !plan_file.exists() {
        tracing::warn!(plan = %plan_name, "resume: plan file missing");
        return ResumeOutcome::PlanMissing {
            state,
            plan: plan_name,
        };
    }

    let completed_steps = match scan_checkpoints(&store.checkpoints_dir()) {
        Ok(steps) => steps,
        Err(e) => {
            tracing::warn!(error = %e, "resume skipped: could not scan checkpoints");
            return ResumeOutcome::Idle { state };
        }
    };
    let Some(next_step) = next_step(&completed_steps) else {
        tracing::warn!(
            plan = %plan_name,
            completed = ?completed_steps,
            "resume skipped: highest checkpoint has no next step"
        );
        return ResumeOutcome::Idle { state };
    };

    tracing::info!(
        plan = %plan_name,
        completed = ?completed_steps,
        next_step,
        "resuming plan"
    );

    ResumeOutcome::Resume(ResumePayload {
        state,
        plan_file,
        completed_steps,
        next_step,
    })
}
