//! CLI struct definitions for the `echo` command-line interface.
//!
//! All clap-derived types live here. Dispatch lives in `lib.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "echo",
    version = env!("CARGO_PKG_VERSION"),
    about = "Local, checksum-verified agent memory: journal thoughts, keep an evolution summary, resume plans after a restart."
)]
pub(crate) struct Cli {
    /// Echo memory directory.
    #[clap(
        long,
        global = true,
        env = "ECHO_MEMORY_DIR",
        default_value = crate::core::store::DEFAULT_ROOT
    )]
    pub root: PathBuf,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub(crate) struct FormatArg {
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct SignalArg {
    /// Do not dispatch an external signal for this entry.
    #[clap(long)]
    pub no_signal: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the directory layout and seed the resume state.
    Init,
    /// Journal a raw thought.
    Log {
        /// pattern_recognition | problem_solving | learning | system_understanding | user_interaction
        #[clap(long)]
        kind: String,
        /// The thought itself.
        content: String,
        /// Context as a JSON object.
        #[clap(long)]
        context: Option<String>,
        /// Dispatch an external signal for this entry.
        #[clap(long)]
        signal: bool,
        #[clap(flatten)]
        format: FormatArg,
    },
    /// Record a recognized pattern (first description per name wins).
    Pattern {
        name: String,
        description: String,
        /// Evidence as a JSON object.
        #[clap(long)]
        evidence: Option<String>,
        #[clap(flatten)]
        signal: SignalArg,
        #[clap(flatten)]
        format: FormatArg,
    },
    /// Record a learned user preference.
    Preference {
        name: String,
        description: String,
        /// Example (repeatable).
        #[clap(long = "example")]
        examples: Vec<String>,
        #[clap(flatten)]
        signal: SignalArg,
        #[clap(flatten)]
        format: FormatArg,
    },
    /// Record (or replace) the understanding of a system component.
    Understand {
        component: String,
        understanding: String,
        /// Connected component (repeatable).
        #[clap(long = "connection")]
        connections: Vec<String>,
        #[clap(flatten)]
        signal: SignalArg,
        #[clap(flatten)]
        format: FormatArg,
    },
    /// Record a learning milestone.
    Milestone {
        name: String,
        description: String,
        #[clap(long)]
        impact: String,
        #[clap(flatten)]
        signal: SignalArg,
        #[clap(flatten)]
        format: FormatArg,
    },
    /// Print the continuity summary for the next session.
    Context {
        #[clap(flatten)]
        format: FormatArg,
    },
    /// Verify journal integrity.
    Verify {
        /// Session journal to verify.
        file: Option<PathBuf>,
        /// Verify every session journal in the directory.
        #[clap(long, conflicts_with = "file")]
        all: bool,
        #[clap(flatten)]
        format: FormatArg,
    },
    /// Show what a restart would resume.
    Resume {
        #[clap(flatten)]
        format: FormatArg,
    },
    /// Run a sample session and print its reflection and continuity summary.
    Demo,
}
