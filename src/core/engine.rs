//! `EchoEngine`: the per-directory handle that ties the journal, the
//! evolution aggregate, resume reconciliation and signal dispatch together.
//!
//! Construct one per log directory and pass it to whatever needs it. Opening
//! an engine starts a session: resume runs once, the aggregate is loaded,
//! and the session is registered in it before `open` returns.

use crate::core::canonical;
use crate::core::config::{self, EchoConfig};
use crate::core::error::EchoError;
use crate::core::evolution::{
    EvolutionState, EvolutionStore, Milestone, PatternEntry, SessionMeta, Understanding,
};
use crate::core::journal::{self, EventRecord, Journal, ThoughtKind, VerificationReport};
use crate::core::reporter::{self, Reflection};
use crate::core::resume::{self, ResumeOutcome};
use crate::core::signal::{JsonlSignalSink, Signal, SignalSink};
use crate::core::store::Store;
use crate::core::time;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

pub struct EchoEngine {
    store: Store,
    config: EchoConfig,
    resume: ResumeOutcome,
    session_id: String,
    journal: Journal,
    thoughts: Vec<EventRecord>,
    evolution: EvolutionStore,
    sink: Option<Box<dyn SignalSink>>,
}

impl std::fmt::Debug for EchoEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoEngine")
            .field("root", &self.store.root)
            .field("session_id", &self.session_id)
            .field("thoughts", &self.thoughts.len())
            .field("signals", &self.sink.is_some())
            .finish()
    }
}

impl EchoEngine {
    /// Open `root` with its `echo.toml` (if any). The configured JSONL sink is
    /// attached when signals are enabled.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, EchoError> {
        let store = Store::new(root);
        let config = config::load_config(&store)?;
        let sink: Option<Box<dyn SignalSink>> = if config.signals.enabled {
            Some(Box::new(JsonlSignalSink::new(
                config.signals.resolved_file(&store),
            )))
        } else {
            None
        };
        Self::open_with(store, config, sink)
    }

    /// Open with an explicit configuration and signal sink (`None` disables signals).
    pub fn open_with(
        store: Store,
        config: EchoConfig,
        sink: Option<Box<dyn SignalSink>>,
    ) -> Result<Self, EchoError> {
        store.bootstrap()?;
        let resume = resume::reconcile(&store);

        let mut evolution = EvolutionStore::load_or_init(store.evolution_path())?;

        let session_id = store.claim_session(&time::compact_stamp())?;
        let journal = Journal::new(store.session_path(&session_id));
        evolution.record_session(SessionMeta {
            session_id: session_id.clone(),
            started: time::now_iso(),
            context: config.session.context.clone(),
            agent_version: config.session.agent_version.clone(),
        })?;

        tracing::info!(
            root = %store.root.display(),
            session = %session_id,
            total_sessions = evolution.state().total_sessions,
            "echo session started"
        );

        Ok(Self {
            store,
            config,
            resume,
            session_id,
            journal,
            thoughts: Vec::new(),
            evolution,
            sink,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &EchoConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_file(&self) -> &Path {
        self.journal.path()
    }

    pub fn evolution_file(&self) -> &Path {
        self.evolution.path()
    }

    pub fn resume_outcome(&self) -> &ResumeOutcome {
        &self.resume
    }

    pub fn evolution(&self) -> &EvolutionState {
        self.evolution.state()
    }

    pub fn thoughts(&self) -> &[EventRecord] {
        &self.thoughts
    }

    /// Journal one thought. Storage failures are returned; a failing signal
    /// sink is logged and the thought is still recorded.
    pub fn log_thought(
        &mut self,
        kind: ThoughtKind,
        content: &str,
        context: Map<String, Value>,
        create_signal: bool,
    ) -> Result<EventRecord, EchoError> {
        let mut record =
            EventRecord::new(time::now_iso(), &self.session_id, kind, content, context);

        if create_signal && let Some(sink) = &self.sink {
            let signal = Signal::now_for_thought(
                &record.kind,
                &record.content,
                &record.context,
                &self.session_id,
            );
            match sink.emit(&signal) {
                Ok(()) => {
                    record.signal_created = true;
                    record.signal_topic = Some(signal.topic);
                }
                Err(e) => {
                    tracing::warn!(topic = %signal.topic, error = %e, "signal dispatch failed");
                }
            }
        }

        let record = record.seal()?;
        self.journal.append(&record)?;
        self.thoughts.push(record.clone());
        self.evolution.record_thought(record.signal_created)?;

        tracing::debug!(
            session = %self.session_id,
            kind = %record.kind,
            signal = record.signal_created,
            "thought journaled"
        );
        Ok(record)
    }

    pub fn recognize_pattern(
        &mut self,
        pattern_name: &str,
        description: &str,
        evidence: Option<Map<String, Value>>,
        notify_external: bool,
    ) -> Result<EventRecord, EchoError> {
        let inserted = self.evolution.add_pattern(PatternEntry {
            timestamp: time::now_iso(),
            pattern: pattern_name.to_string(),
            description: description.to_string(),
            evidence: evidence.clone().unwrap_or_default(),
        })?;
        if !inserted {
            tracing::debug!(
                pattern = pattern_name,
                "pattern already recorded; keeping first entry"
            );
        }

        let mut context = Map::new();
        context.insert("pattern".to_string(), json!(pattern_name));
        context.insert(
            "evidence".to_string(),
            evidence.map(Value::Object).unwrap_or(Value::Null),
        );
        self.log_thought(
            ThoughtKind::PatternRecognition,
            &format!("Pattern Recognized: {pattern_name}\n{description}"),
            context,
            notify_external,
        )
    }

    pub fn learn_preference(
        &mut self,
        preference_name: &str,
        description: &str,
        examples: Vec<String>,
        notify_external: bool,
    ) -> Result<EventRecord, EchoError> {
        let mut context = Map::new();
        context.insert("preference".to_string(), json!(preference_name));
        context.insert("examples".to_string(), json!(examples));
        self.log_thought(
            ThoughtKind::UserInteraction,
            &format!("Learned Preference: {preference_name}\n{description}"),
            context,
            notify_external,
        )
    }

    pub fn understand_system(
        &mut self,
        component: &str,
        understanding: &str,
        connections: Vec<String>,
        notify_external: bool,
    ) -> Result<EventRecord, EchoError> {
        self.evolution.set_understanding(
            component,
            Understanding {
                understanding: understanding.to_string(),
                connections: connections.clone(),
                learned: time::now_iso(),
            },
        )?;

        let mut context = Map::new();
        context.insert("component".to_string(), json!(component));
        context.insert("connections".to_string(), json!(connections));
        self.log_thought(
            ThoughtKind::SystemUnderstanding,
            &format!("System Understanding: {component}\n{understanding}"),
            context,
            notify_external,
        )
    }

    pub fn milestone(
        &mut self,
        milestone_name: &str,
        description: &str,
        impact: &str,
        notify_external: bool,
    ) -> Result<EventRecord, EchoError> {
        let entry = Milestone {
            timestamp: time::now_iso(),
            milestone: milestone_name.to_string(),
            description: description.to_string(),
            impact: impact.to_string(),
        };
        self.evolution.add_milestone(entry.clone())?;

        let context = match serde_json::to_value(&entry)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.log_thought(
            ThoughtKind::Learning,
            &format!("Milestone: {milestone_name}\n{description}\nImpact: {impact}"),
            context,
            notify_external,
        )
    }

    pub fn reflect(&self) -> Reflection {
        reporter::reflect(&self.session_id, &self.thoughts, self.evolution.state())
    }

    pub fn continuity_context(&self) -> String {
        reporter::continuity_summary(self.evolution.state(), &self.config.summary)
    }

    pub fn verify_entry(&self, record: &Value) -> bool {
        canonical::verify_entry(record)
    }

    pub fn verify_session(&self, session_file: &Path) -> Result<VerificationReport, EchoError> {
        journal::verify_session(session_file)
    }

    pub fn verify_current_session(&self) -> Result<VerificationReport, EchoError> {
        journal::verify_session(self.journal.path())
    }
}
