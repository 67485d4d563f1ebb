//! On-disk layout of an echo memory directory.
//!
//! ```text
//! <root>/
//!   echo.toml                       optional configuration
//!   evolution.json                  evolution aggregate
//!   session_<id>.jsonl              one journal per session
//!   echo_state/
//!     state.json                    resume pointer
//!     plan/<name>                   plan files (existence-checked only)
//!     logs/                         signal sink output
//!     checkpoints/step-<N>.ok       completed-step markers
//! ```

use crate::core::error::EchoError;
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_ROOT: &str = ".echo_memory";
pub const EVOLUTION_FILE: &str = "evolution.json";
pub const CONFIG_FILE: &str = "echo.toml";
pub const SESSION_PREFIX: &str = "session_";
pub const SESSION_SUFFIX: &str = ".jsonl";
/// Length of a `%Y%m%d_%H%M%S` session stamp.
const STAMP_LEN: usize = 15;

/// Handle on one echo memory directory. Cheap to clone; holds no open files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn evolution_path(&self) -> PathBuf {
        self.root.join(EVOLUTION_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn session_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join(format!("{SESSION_PREFIX}{session_id}{SESSION_SUFFIX}"))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("echo_state")
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join("state.json")
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.state_dir().join("plan")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.state_dir().join("checkpoints")
    }

    /// Create the directory tree and seed a default resume state if none exists.
    pub fn bootstrap(&self) -> Result<(), EchoError> {
        for dir in [self.plans_dir(), self.logs_dir(), self.checkpoints_dir()] {
            fs::create_dir_all(&dir)?;
        }

        let state_path = self.state_path();
        if !state_path.exists() {
            let seed = json!({
                "version": 1,
                "current_plan": null,
                "current_step": 0,
                "args": {}
            });
            let mut body = serde_json::to_string_pretty(&seed)?;
            body.push('\n');
            fs::write(&state_path, body)?;
        }
        Ok(())
    }

    /// Claim a session id derived from `stamp` by creating its (empty) journal.
    /// Ids already taken in this directory get a `_2`, `_3`, ... suffix.
    pub fn claim_session(&self, stamp: &str) -> Result<String, EchoError> {
        let mut n = 1u32;
        loop {
            let candidate = if n == 1 {
                stamp.to_string()
            } else {
                format!("{stamp}_{n}")
            };
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.session_path(&candidate))
            {
                Ok(_) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// All session journals under the root, oldest first: by stamp, then by
    /// collision suffix (`_2` before `_10`).
    pub fn list_session_files(&self) -> Result<Vec<PathBuf>, EchoError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if is_session_file(&path) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| session_order_key(a).cmp(&session_order_key(b)));
        Ok(files)
    }

    /// The most recently claimed session journal, if any.
    pub fn latest_session_file(&self) -> Result<Option<PathBuf>, EchoError> {
        Ok(self.list_session_files()?.pop())
    }
}

/// `(stamp, suffix)` for a journal path; ids without a numeric `_N` after
/// the 15-character stamp sort as suffix 1.
fn session_order_key(path: &Path) -> (String, u64) {
    let id = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(SESSION_PREFIX))
        .and_then(|n| n.strip_suffix(SESSION_SUFFIX))
        .unwrap_or_default();

    let suffix = id
        .get(STAMP_LEN..)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|n| n.parse::<u64>().ok());
    match suffix {
        Some(n) => (id[..STAMP_LEN].to_string(), n),
        None => (id.to_string(), 1),
    }
}

pub fn is_session_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(SESSION_PREFIX) && n.ends_with(SESSION_SUFFIX))
}
