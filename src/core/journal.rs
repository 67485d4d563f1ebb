//! Append-only session journals of checksummed thought records.
//!
//! Each session writes `session_<id>.jsonl`, one record per line. A record's
//! checksum is the last field set before it is written, and lines are never
//! rewritten. Verification reads a journal back line by line and sorts every
//! record into verified, tampered, or missing-checksum.

use crate::core::canonical;
use crate::core::error::EchoError;
use crate::core::output;
use crate::core::store::Store;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kind of thought recorded in the journal. Kinds outside the known set are
/// kept verbatim so foreign journals still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ThoughtKind {
    PatternRecognition,
    ProblemSolving,
    Learning,
    SystemUnderstanding,
    UserInteraction,
    Other(String),
}

impl ThoughtKind {
    pub fn as_str(&self) -> &str {
        match self {
            ThoughtKind::PatternRecognition => "pattern_recognition",
            ThoughtKind::ProblemSolving => "problem_solving",
            ThoughtKind::Learning => "learning",
            ThoughtKind::SystemUnderstanding => "system_understanding",
            ThoughtKind::UserInteraction => "user_interaction",
            ThoughtKind::Other(s) => s,
        }
    }
}

impl From<String> for ThoughtKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pattern_recognition" => ThoughtKind::PatternRecognition,
            "problem_solving" => ThoughtKind::ProblemSolving,
            "learning" => ThoughtKind::Learning,
            "system_understanding" => ThoughtKind::SystemUnderstanding,
            "user_interaction" => ThoughtKind::UserInteraction,
            _ => ThoughtKind::Other(s),
        }
    }
}

impl From<ThoughtKind> for String {
    fn from(kind: ThoughtKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for ThoughtKind {
    type Err = EchoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EchoError::ValidationError(
                "thought kind cannot be empty".to_string(),
            ));
        }
        Ok(ThoughtKind::from(trimmed.to_string()))
    }
}

impl fmt::Display for ThoughtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One journal line. Field names are the on-disk wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: ThoughtKind,
    pub content: String,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub signal_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl EventRecord {
    pub fn new(
        timestamp: String,
        session_id: &str,
        kind: ThoughtKind,
        content: &str,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp,
            session_id: session_id.to_string(),
            kind,
            content: content.to_string(),
            context,
            signal_created: false,
            signal_topic: None,
            checksum: None,
        }
    }

    pub fn to_value(&self) -> Result<Value, EchoError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Attach the checksum. Must be the final mutation before the record is written.
    pub fn seal(mut self) -> Result<Self, EchoError> {
        self.checksum = None;
        let digest = canonical::hash_entry(&self.to_value()?);
        self.checksum = Some(digest);
        Ok(self)
    }

    pub fn verify(&self) -> bool {
        self.to_value()
            .map(|v| canonical::verify_entry(&v))
            .unwrap_or(false)
    }
}

/// Writer for one session's journal file.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one sealed record as a single line and flush it to the OS.
    pub fn append(&self, record: &EventRecord) -> Result<(), EchoError> {
        if record.checksum.is_none() {
            return Err(EchoError::ValidationError(
                "refusing to journal an unsealed record".to_string(),
            ));
        }

        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Verified,
    Tampered,
    MissingChecksum,
}

pub fn classify_entry(record: &Value) -> EntryStatus {
    if !canonical::has_checksum(record) {
        EntryStatus::MissingChecksum
    } else if canonical::verify_entry(record) {
        EntryStatus::Verified
    } else {
        EntryStatus::Tampered
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub session_file: String,
    pub total_entries: usize,
    pub verified: usize,
    pub tampered: usize,
    pub missing_checksum: usize,
    /// `verified / total` as `"NN.N%"`, or `"N/A"` for an empty journal.
    pub integrity_rate: String,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.tampered == 0 && self.missing_checksum == 0
    }
}

/// Verify every line of a session journal. Any line that is not a JSON
/// object fails the whole verification.
pub fn verify_session(path: &Path) -> Result<VerificationReport, EchoError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut verified = 0;
    let mut tampered = 0;
    let mut missing_checksum = 0;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let record: Value = serde_json::from_str(line.trim()).map_err(|e| {
            EchoError::ValidationError(format!(
                "{}:{}: unreadable journal record: {}",
                path.display(),
                idx + 1,
                e
            ))
        })?;
        if !record.is_object() {
            return Err(EchoError::ValidationError(format!(
                "{}:{}: journal record is not a JSON object",
                path.display(),
                idx + 1
            )));
        }

        match classify_entry(&record) {
            EntryStatus::Verified => verified += 1,
            EntryStatus::Tampered => {
                tracing::debug!(file = %path.display(), line = idx + 1, "checksum mismatch");
                tampered += 1;
            }
            EntryStatus::MissingChecksum => missing_checksum += 1,
        }
    }

    let total = verified + tampered + missing_checksum;
    Ok(VerificationReport {
        session_file: path.display().to_string(),
        total_entries: total,
        verified,
        tampered,
        missing_checksum,
        integrity_rate: output::percent(verified, total),
    })
}

/// Verify every session journal in the store, oldest session first.
pub fn verify_all(store: &Store) -> Result<Vec<VerificationReport>, EchoError> {
    let files = store.list_session_files()?;
    files
        .par_iter()
        .map(|path| verify_session(path))
        .collect::<Result<Vec<_>, _>>()
}
