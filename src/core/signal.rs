//! Outbound signals derived from journal entries.
//!
//! The journal hands a [`Signal`] to whatever [`SignalSink`] the engine was
//! built with. Sinks are opaque: a failing sink is logged by the caller and
//! never blocks the append that triggered it.

use crate::core::error::EchoError;
use crate::core::journal::ThoughtKind;
use crate::core::time;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    CodePattern,
    SolutionApproach,
    ArchitectureInsight,
    UserPreference,
    EvolutionMilestone,
    GeneralInsight,
}

impl SignalCategory {
    pub fn for_kind(kind: &ThoughtKind) -> Self {
        match kind {
            ThoughtKind::PatternRecognition => SignalCategory::CodePattern,
            ThoughtKind::ProblemSolving => SignalCategory::SolutionApproach,
            ThoughtKind::SystemUnderstanding => SignalCategory::ArchitectureInsight,
            ThoughtKind::UserInteraction => SignalCategory::UserPreference,
            ThoughtKind::Learning => SignalCategory::EvolutionMilestone,
            ThoughtKind::Other(_) => SignalCategory::GeneralInsight,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::CodePattern => "code_pattern",
            SignalCategory::SolutionApproach => "solution_approach",
            SignalCategory::ArchitectureInsight => "architecture_insight",
            SignalCategory::UserPreference => "user_preference",
            SignalCategory::EvolutionMilestone => "evolution_milestone",
            SignalCategory::GeneralInsight => "general_insight",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub topic: String,
    pub content: Value,
    pub tags: Vec<String>,
    pub references: Map<String, Value>,
}

impl Signal {
    /// Build the signal for one thought. `stamp` is the compact
    /// `%Y%m%d_%H%M%S` time that ends the topic name.
    pub fn for_thought(
        kind: &ThoughtKind,
        content: &str,
        context: &Map<String, Value>,
        session_id: &str,
        stamp: &str,
    ) -> Self {
        let category = SignalCategory::for_kind(kind);
        let mut references = Map::new();
        references.insert("session_id".to_string(), json!(session_id));

        Self {
            topic: format!("Echo_{}_{}", category.as_str(), stamp),
            content: json!({
                "thought": content,
                "type": kind.as_str(),
                "context": context,
                "value": "AI insight for external system",
            }),
            tags: vec![
                "ai_thought".to_string(),
                "external_signal".to_string(),
                category.as_str().to_string(),
            ],
            references,
        }
    }

    pub fn now_for_thought(
        kind: &ThoughtKind,
        content: &str,
        context: &Map<String, Value>,
        session_id: &str,
    ) -> Self {
        Self::for_thought(kind, content, context, session_id, &time::compact_stamp())
    }
}

/// Destination for outbound signals.
pub trait SignalSink: Send + Sync {
    fn emit(&self, signal: &Signal) -> Result<(), EchoError>;
}

/// Appends each signal as one JSON line to a local file.
#[derive(Debug, Clone)]
pub struct JsonlSignalSink {
    path: PathBuf,
}

impl JsonlSignalSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSink for JsonlSignalSink {
    fn emit(&self, signal: &Signal) -> Result<(), EchoError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(signal)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn every_known_kind_has_its_own_category() {
        let table = [
            (ThoughtKind::PatternRecognition, "code_pattern"),
            (ThoughtKind::ProblemSolving, "solution_approach"),
            (ThoughtKind::SystemUnderstanding, "architecture_insight"),
            (ThoughtKind::UserInteraction, "user_preference"),
            (ThoughtKind::Learning, "evolution_milestone"),
            (ThoughtKind::Other("musing".into()), "general_insight"),
        ];
        for (kind, expected) in table {
            assert_eq!(SignalCategory::for_kind(&kind).as_str(), expected);
        }
    }

    #[test]
    fn signal_shape() {
        let mut ctx = Map::new();
        ctx.insert("file".into(), json!("src/lib.rs"));
        let signal = Signal::for_thought(
            &ThoughtKind::PatternRecognition,
            "layers",
            &ctx,
            "20251027_100000",
            "20251027_100501",
        );
        assert_eq!(signal.topic, "Echo_code_pattern_20251027_100501");
        assert_eq!(signal.tags, vec!["ai_thought", "external_signal", "code_pattern"]);
        assert_eq!(signal.references["session_id"], "20251027_100000");
        assert_eq!(signal.content["type"], "pattern_recognition");
        assert_eq!(signal.content["context"]["file"], "src/lib.rs");
    }

    #[test]
    fn jsonl_sink_appends_lines() {
        let dir = tempdir().unwrap();
        let sink = JsonlSignalSink::new(dir.path().join("logs/signals.jsonl"));
        let signal =
            Signal::for_thought(&ThoughtKind::Learning, "x", &Map::new(), "s", "20250101_000000");
        sink.emit(&signal).unwrap();
        sink.emit(&signal).unwrap();

        let body = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Signal = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, signal);
    }
}
