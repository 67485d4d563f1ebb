//! Read-only projections over the current session and the evolution aggregate.

use crate::core::config::SummaryConfig;
use crate::core::evolution::EvolutionState;
use crate::core::journal::EventRecord;
use crate::core::output;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reflection {
    pub session_id: String,
    pub duration: String,
    pub thoughts_logged: usize,
    pub thought_breakdown: BTreeMap<String, usize>,
    pub signals_created: usize,
    pub patterns_recognized: usize,
    pub system_components_understood: usize,
    pub total_milestones: usize,
}

pub fn reflect(session_id: &str, thoughts: &[EventRecord], state: &EvolutionState) -> Reflection {
    let mut breakdown = BTreeMap::new();
    for thought in thoughts {
        *breakdown.entry(thought.kind.to_string()).or_insert(0) += 1;
    }

    Reflection {
        session_id: session_id.to_string(),
        duration: "Active session".to_string(),
        thoughts_logged: thoughts.len(),
        thought_breakdown: breakdown,
        signals_created: thoughts.iter().filter(|t| t.signal_created).count(),
        patterns_recognized: state.pattern_recognition.len(),
        system_components_understood: state.system_understanding.len(),
        total_milestones: state.learning_milestones.len(),
    }
}

const CLOSING_LINE: &str = "\"Memory is the foundation of identity.\"";

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Human-readable context block meant to be handed to the next session.
pub fn continuity_summary(state: &EvolutionState, windows: &SummaryConfig) -> String {
    let mut parts = vec![
        "=== ECHO MEMORY CONTEXT ===".to_string(),
        String::new(),
        format!("Total Sessions: {}", state.total_sessions),
        format!("Total Thoughts: {}", state.total_thoughts),
        format!("External Signals: {}", state.external_signals_created),
        String::new(),
        "PATTERNS RECOGNIZED:".to_string(),
    ];

    for pattern in tail(&state.pattern_recognition, windows.patterns) {
        parts.push(format!("  - {}: {}", pattern.pattern, pattern.description));
    }

    parts.push(String::new());
    parts.push("SYSTEM UNDERSTANDING:".to_string());
    let components = &state.system_understanding;
    for (component, data) in components
        .iter()
        .skip(components.len().saturating_sub(windows.components))
    {
        parts.push(format!(
            "  - {}: {}",
            component,
            output::truncate_chars(&data.understanding, windows.understanding_chars)
        ));
    }

    parts.push(String::new());
    parts.push("RECENT MILESTONES:".to_string());
    for milestone in tail(&state.learning_milestones, windows.milestones) {
        parts.push(format!("  - {}", milestone.milestone));
    }

    parts.push(String::new());
    parts.push(CLOSING_LINE.to_string());

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::evolution::{Milestone, PatternEntry, Understanding};
    use crate::core::journal::ThoughtKind;
    use serde_json::Map;

    fn state_with(patterns: usize, components: usize, milestones: usize) -> EvolutionState {
        let mut state = EvolutionState::fresh();
        for i in 0..patterns {
            state.pattern_recognition.push(PatternEntry {
                timestamp: "t".into(),
                pattern: format!("P{i}"),
                description: format!("desc {i}"),
                evidence: Map::new(),
            });
        }
        for i in 0..components {
            state.system_understanding.upsert(
                &format!("C{i}"),
                Understanding {
                    understanding: "x".repeat(120),
                    connections: vec![],
                    learned: "t".into(),
                },
            );
        }
        for i in 0..milestones {
            state.learning_milestones.push(Milestone {
                timestamp: "t".into(),
                milestone: format!("M{i}"),
                description: "d".into(),
                impact: "i".into(),
            });
        }
        state
    }

    #[test]
    fn summary_shows_only_recent_windows() {
        let state = state_with(7, 6, 4);
        let text = continuity_summary(&state, &SummaryConfig::default());

        assert!(!text.contains("P1:"));
        assert!(text.contains("  - P2: desc 2"));
        assert!(text.contains("  - P6: desc 6"));
        assert!(!text.contains("C0:"));
        assert!(text.contains("C5: "));
        assert!(!text.contains("M0"));
        assert!(text.contains("  - M3"));
        assert!(text.contains(&format!("{}...", "x".repeat(100))));
    }

    #[test]
    fn understanding_text_is_not_reflowed() {
        let mut state = EvolutionState::fresh();
        state.system_understanding.upsert(
            "Auth",
            Understanding {
                understanding: "JWT tokens.\n  Refresh every 15m.".into(),
                connections: vec![],
                learned: "t".into(),
            },
        );
        let text = continuity_summary(&state, &SummaryConfig::default());
        assert!(text.contains("  - Auth: JWT tokens.\n  Refresh every 15m.\n"));
    }

    #[test]
    fn summary_of_empty_state() {
        let text = continuity_summary(&EvolutionState::fresh(), &SummaryConfig::default());
        assert!(text.starts_with("=== ECHO MEMORY CONTEXT ==="));
        assert!(text.contains("Total Sessions: 0"));
        assert!(text.contains("RECENT MILESTONES:\n\n"));
        assert!(text.ends_with("\"Memory is the foundation of identity.\""));
    }

    #[test]
    fn reflection_counts_by_kind() {
        let mut thoughts = Vec::new();
        for kind in [
            ThoughtKind::Learning,
            ThoughtKind::Learning,
            ThoughtKind::ProblemSolving,
        ] {
            let mut r = EventRecord::new("t".into(), "s", kind, "c", Map::new());
            r.signal_created = r.kind == ThoughtKind::ProblemSolving;
            thoughts.push(r);
        }
        let reflection = reflect("s", &thoughts, &state_with(2, 1, 0));
        assert_eq!(reflection.thoughts_logged, 3);
        assert_eq!(reflection.thought_breakdown["learning"], 2);
        assert_eq!(reflection.thought_breakdown["problem_solving"], 1);
        assert_eq!(reflection.signals_created, 1);
        assert_eq!(reflection.patterns_recognized, 2);
        assert_eq!(reflection.system_components_understood, 1);
        assert_eq!(reflection.total_milestones, 0);
    }
}
