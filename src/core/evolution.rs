//! The evolution aggregate: one cross-session summary document per store.
//!
//! Every mutation rewrites `evolution.json` in full before returning. The
//! write goes to a sibling temp file that is then renamed over the target,
//! so a crash leaves either the old or the new document.

use crate::core::error::EchoError;
use crate::core::time;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub timestamp: String,
    pub milestone: String,
    pub description: String,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub timestamp: String,
    pub pattern: String,
    pub description: String,
    #[serde(default)]
    pub evidence: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Understanding {
    pub understanding: String,
    #[serde(default)]
    pub connections: Vec<String>,
    pub learned: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: String,
    pub started: String,
    pub context: String,
    pub agent_version: String,
}

/// Component name -> understanding, in first-recorded order. Re-recording a
/// component replaces its record but keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentMap(Vec<(String, Understanding)>);

impl ComponentMap {
    pub fn upsert(&mut self, component: &str, understanding: Understanding) {
        match self.0.iter_mut().find(|(name, _)| name == component) {
            Some((_, slot)) => *slot = understanding,
            None => self.0.push((component.to_string(), understanding)),
        }
    }

    pub fn get(&self, component: &str) -> Option<&Understanding> {
        self.0
            .iter()
            .find(|(name, _)| name == component)
            .map(|(_, u)| u)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(
        &self,
    ) -> impl DoubleEndedIterator<Item = (&str, &Understanding)> + ExactSizeIterator {
        self.0.iter().map(|(name, u)| (name.as_str(), u))
    }
}

impl Serialize for ComponentMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for ComponentMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // serde_json's map keeps document order (preserve_order).
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut out = ComponentMap::default();
        for (name, value) in raw {
            let understanding: Understanding =
                serde_json::from_value(value).map_err(D::Error::custom)?;
            out.0.push((name, understanding));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionState {
    pub created: String,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub total_thoughts: u64,
    #[serde(default)]
    pub learning_milestones: Vec<Milestone>,
    #[serde(default)]
    pub pattern_recognition: Vec<PatternEntry>,
    #[serde(default)]
    pub system_understanding: ComponentMap,
    #[serde(default)]
    pub external_signals_created: u64,
    #[serde(default)]
    pub sessions: Vec<SessionMeta>,
}

impl EvolutionState {
    pub fn fresh() -> Self {
        Self {
            created: time::now_iso(),
            total_sessions: 0,
            total_thoughts: 0,
            learning_milestones: Vec::new(),
            pattern_recognition: Vec::new(),
            system_understanding: ComponentMap::default(),
            external_signals_created: 0,
            sessions: Vec::new(),
        }
    }

    pub fn has_pattern(&self, name: &str) -> bool {
        self.pattern_recognition.iter().any(|p| p.pattern == name)
    }
}

/// The aggregate plus the file it lives in.
#[derive(Debug)]
pub struct EvolutionStore {
    path: PathBuf,
    state: EvolutionState,
}

impl EvolutionStore {
    /// Load the aggregate, or start a fresh one (unsaved) if the file is absent.
    pub fn load_or_init(path: impl Into<PathBuf>) -> Result<Self, EchoError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| {
                EchoError::ValidationError(format!(
                    "invalid evolution document {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            EvolutionState::fresh()
        };
        Ok(Self { path, state })
    }

    pub fn state(&self) -> &EvolutionState {
        &self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), EchoError> {
        write_atomic(&self.path, &self.state)
    }

    pub fn record_session(&mut self, meta: SessionMeta) -> Result<(), EchoError> {
        self.state.total_sessions += 1;
        self.state.sessions.push(meta);
        self.save()
    }

    pub fn record_thought(&mut self, signal_created: bool) -> Result<(), EchoError> {
        self.state.total_thoughts += 1;
        if signal_created {
            self.state.external_signals_created += 1;
        }
        self.save()
    }

    /// Insert a pattern unless one with the same name exists. Returns whether
    /// it was inserted; a duplicate leaves the first entry untouched and
    /// skips the persist.
    pub fn add_pattern(&mut self, entry: PatternEntry) -> Result<bool, EchoError> {
        if self.state.has_pattern(&entry.pattern) {
            return Ok(false);
        }
        self.state.pattern_recognition.push(entry);
        self.save()?;
        Ok(true)
    }

    pub fn add_milestone(&mut self, milestone: Milestone) -> Result<(), EchoError> {
        self.state.learning_milestones.push(milestone);
        self.save()
    }

    pub fn set_understanding(
        &mut self,
        component: &str,
        understanding: Understanding,
    ) -> Result<(), EchoError> {
        self.state
            .system_understanding
            .upsert(component, understanding);
        self.save()
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), EchoError> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| EchoError::ValidationError(format!("invalid path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let mut file = fs::File::create(&tmp)?;
    file.write_all(&body)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn pattern(name: &str, description: &str) -> PatternEntry {
        PatternEntry {
            timestamp: time::now_iso(),
            pattern: name.to_string(),
            description: description.to_string(),
            evidence: Map::new(),
        }
    }

    fn understanding(text: &str) -> Understanding {
        Understanding {
            understanding: text.to_string(),
            connections: vec![],
            learned: time::now_iso(),
        }
    }

    #[test]
    fn fresh_store_is_not_written_until_mutated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evolution.json");
        let mut store = EvolutionStore::load_or_init(&path).unwrap();
        assert!(!path.exists());

        store.record_thought(true).unwrap();
        let reloaded = EvolutionStore::load_or_init(&path).unwrap();
        assert_eq!(reloaded.state().total_thoughts, 1);
        assert_eq!(reloaded.state().external_signals_created, 1);
        assert!(!dir.path().join(".evolution.json.tmp").exists());
    }

    #[test]
    fn duplicate_pattern_keeps_first_description() {
        let dir = tempdir().unwrap();
        let mut store = EvolutionStore::load_or_init(dir.path().join("evolution.json")).unwrap();
        assert!(store.add_pattern(pattern("Layers", "first")).unwrap());
        assert!(!store.add_pattern(pattern("Layers", "second")).unwrap());

        let patterns = &store.state().pattern_recognition;
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].description, "first");
    }

    #[test]
    fn understanding_overwrites_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evolution.json");
        let mut store = EvolutionStore::load_or_init(&path).unwrap();
        store.set_understanding("Auth", understanding("v1")).unwrap();
        store.set_understanding("Cache", understanding("lru")).unwrap();
        store.set_understanding("Auth", understanding("v2")).unwrap();

        let reloaded = EvolutionStore::load_or_init(&path).unwrap();
        let names: Vec<_> = reloaded
            .state()
            .system_understanding
            .iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["Auth", "Cache"]);
        assert_eq!(
            reloaded.state().system_understanding.get("Auth").unwrap().understanding,
            "v2"
        );
    }

    #[test]
    fn milestones_always_append() {
        let dir = tempdir().unwrap();
        let mut store = EvolutionStore::load_or_init(dir.path().join("evolution.json")).unwrap();
        let m = Milestone {
            timestamp: time::now_iso(),
            milestone: "Hooks".into(),
            description: "d".into(),
            impact: "i".into(),
        };
        store.add_milestone(m.clone()).unwrap();
        store.add_milestone(m).unwrap();
        assert_eq!(store.state().learning_milestones.len(), 2);
    }

    #[test]
    fn loads_document_with_missing_collections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evolution.json");
        fs::write(
            &path,
            json!({"created": "2025-10-27T10:00:00", "total_sessions": 4}).to_string(),
        )
        .unwrap();
        let store = EvolutionStore::load_or_init(&path).unwrap();
        assert_eq!(store.state().total_sessions, 4);
        assert!(store.state().system_understanding.is_empty());
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("evolution.json");
        fs::write(&path, "{ half").unwrap();
        assert!(matches!(
            EvolutionStore::load_or_init(&path),
            Err(EchoError::ValidationError(_))
        ));
    }
}
