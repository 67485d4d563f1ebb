//! Echo Memory: local, checksum-verified memory for AI agents.
//!
//! An agent journals discrete thoughts into an append-only, per-session log
//! where every line carries a SHA-256 checksum over its canonical form. A
//! single evolution document summarizes sessions, patterns, milestones and
//! per-component understanding across runs, and a small resume pointer plus
//! on-disk checkpoint markers let an interrupted multi-step plan pick up at
//! the right step after a restart.
//!
//! # Layout
//!
//! ```text
//! .echo_memory/
//!   evolution.json
//!   session_<id>.jsonl
//!   echo_state/{state.json, plan/, logs/, checkpoints/step-<N>.ok}
//! ```
//!
//! # Library use
//!
//! ```no_run
//! use echo_memory::core::engine::EchoEngine;
//!
//! let mut echo = EchoEngine::open(".echo_memory")?;
//! echo.recognize_pattern("Layered modules", "core/ never imports cli/", None, false)?;
//! let report = echo.verify_current_session()?;
//! assert_eq!(report.tampered, 0);
//! println!("{}", echo.continuity_context());
//! # Ok::<(), echo_memory::core::error::EchoError>(())
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: journal, checksum codec, evolution aggregate, resume
//!   reconciler, reporter, signal sinks and the [`core::engine::EchoEngine`] handle.

mod cli;
pub mod core;

use crate::cli::{Cli, Command, FormatArg};
use crate::core::{
    config,
    engine::EchoEngine,
    error::EchoError,
    evolution::EvolutionStore,
    journal::{self, EventRecord, ThoughtKind, VerificationReport},
    resume::{self, ResumeOutcome},
    store::Store,
    time,
};
use clap::Parser;
use colored::Colorize;
use serde_json::{Map, Value};

pub fn run() -> Result<(), EchoError> {
    let cli = Cli::parse();
    let store = Store::new(cli.root.clone());

    match cli.command {
        Command::Init => {
            store.bootstrap()?;
            println!(
                "{} Initialized echo memory at {}",
                "✓".bright_green(),
                store.root.display()
            );
        }
        Command::Log {
            kind,
            content,
            context,
            signal,
            format,
        } => {
            let kind: ThoughtKind = kind.parse()?;
            let context = parse_json_object("--context", context.as_deref())?;
            let mut engine = EchoEngine::open(&store.root)?;
            let record = engine.log_thought(kind, &content, context, signal)?;
            print_record("log", &record, &format)?;
        }
        Command::Pattern {
            name,
            description,
            evidence,
            signal,
            format,
        } => {
            let evidence = match evidence.as_deref() {
                Some(raw) => Some(parse_json_object("--evidence", Some(raw))?),
                None => None,
            };
            let mut engine = EchoEngine::open(&store.root)?;
            let record =
                engine.recognize_pattern(&name, &description, evidence, !signal.no_signal)?;
            print_record("pattern", &record, &format)?;
        }
        Command::Preference {
            name,
            description,
            examples,
            signal,
            format,
        } => {
            let mut engine = EchoEngine::open(&store.root)?;
            let record =
                engine.learn_preference(&name, &description, examples, !signal.no_signal)?;
            print_record("preference", &record, &format)?;
        }
        Command::Understand {
            component,
            understanding,
            connections,
            signal,
            format,
        } => {
            let mut engine = EchoEngine::open(&store.root)?;
            let record = engine.understand_system(
                &component,
                &understanding,
                connections,
                !signal.no_signal,
            )?;
            print_record("understand", &record, &format)?;
        }
        Command::Milestone {
            name,
            description,
            impact,
            signal,
            format,
        } => {
            let mut engine = EchoEngine::open(&store.root)?;
            let record = engine.milestone(&name, &description, &impact, !signal.no_signal)?;
            print_record("milestone", &record, &format)?;
        }
        Command::Context { format } => {
            let config = config::load_config(&store)?;
            let evolution = EvolutionStore::load_or_init(store.evolution_path())?;
            let summary =
                crate::core::reporter::continuity_summary(evolution.state(), &config.summary);
            if is_json(&format) {
                print_json(&time::command_envelope(
                    "context",
                    "ok",
                    serde_json::json!({ "summary": summary, "evolution": evolution.state() }),
                ))?;
            } else {
                println!("{}", summary);
            }
        }
        Command::Verify { file, all, format } => {
            let reports = match (file, all) {
                (Some(path), _) => vec![journal::verify_session(&path)?],
                (None, true) => journal::verify_all(&store)?,
                (None, false) => {
                    let latest = store.latest_session_file()?.ok_or_else(|| {
                        EchoError::NotFound(format!(
                            "no session journals under {}",
                            store.root.display()
                        ))
                    })?;
                    vec![journal::verify_session(&latest)?]
                }
            };
            print_reports(&reports, &format)?;
        }
        Command::Resume { format } => {
            let outcome = resume::reconcile(&store);
            print_resume(&outcome, &format)?;
        }
        Command::Demo => run_demo(&store)?,
    }

    Ok(())
}

fn parse_json_object(flag: &str, raw: Option<&str>) -> Result<Map<String, Value>, EchoError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(EchoError::ValidationError(format!(
            "{flag} must be a JSON object, got {other}"
        ))),
    }
}

fn is_json(format: &FormatArg) -> bool {
    format.format.eq_ignore_ascii_case("json")
}

fn print_json(value: &Value) -> Result<(), EchoError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_record(cmd: &str, record: &EventRecord, format: &FormatArg) -> Result<(), EchoError> {
    if is_json(format) {
        return print_json(&time::command_envelope(
            cmd,
            "ok",
            serde_json::json!({ "record": record }),
        ));
    }
    println!(
        "{} {} [{}] {}",
        "✓".bright_green(),
        record.timestamp,
        record.kind.to_string().bright_cyan(),
        crate::core::output::compact_line(&record.content, 80)
    );
    if let Some(topic) = &record.signal_topic {
        println!("  signal: {}", topic);
    }
    println!("  checksum: {}", record.checksum.as_deref().unwrap_or("-"));
    Ok(())
}

fn print_reports(reports: &[VerificationReport], format: &FormatArg) -> Result<(), EchoError> {
    if is_json(format) {
        let status = if reports.iter().all(VerificationReport::is_clean) {
            "ok"
        } else {
            "degraded"
        };
        return print_json(&time::command_envelope(
            "verify",
            status,
            serde_json::json!({ "reports": reports }),
        ));
    }

    for report in reports {
        let marker = if report.is_clean() {
            "✓".bright_green()
        } else {
            "⚠".bright_yellow()
        };
        println!("{} {}", marker, report.session_file);
        println!(
            "  entries: {}  verified: {}  tampered: {}  missing checksum: {}  integrity: {}",
            report.total_entries,
            report.verified,
            report.tampered,
            report.missing_checksum,
            report.integrity_rate
        );
    }
    Ok(())
}

fn print_resume(outcome: &ResumeOutcome, format: &FormatArg) -> Result<(), EchoError> {
    if is_json(format) {
        return print_json(&time::command_envelope(
            "resume",
            "ok",
            serde_json::json!({ "resume": outcome }),
        ));
    }
    match outcome {
        ResumeOutcome::NoState => println!("No resume state."),
        ResumeOutcome::Idle { .. } => println!("No active plan."),
        ResumeOutcome::PlanMissing { plan, .. } => {
            println!("{} Plan file missing for {}", "⚠".bright_yellow(), plan)
        }
        ResumeOutcome::Resume(payload) => {
            println!(
                "{} plan={} completed={:?} next_step={}",
                "↻".bright_cyan(),
                payload.plan_file.display(),
                payload.completed_steps,
                payload.next_step
            );
        }
    }
    Ok(())
}

fn run_demo(store: &Store) -> Result<(), EchoError> {
    let mut engine = EchoEngine::open(&store.root)?;

    let mut evidence = Map::new();
    evidence.insert(
        "examples".to_string(),
        serde_json::json!(["src/core/ logic separation", "tests/ mirroring src/ structure"]),
    );
    engine.recognize_pattern(
        "Clean Code Structure",
        "User prefers modular design with clear separation of concerns",
        Some(evidence),
        true,
    )?;
    engine.learn_preference(
        "Documentation First",
        "Always update README.md before changing code",
        vec!["Rejected PR #42 due to missing docs".to_string()],
        true,
    )?;
    engine.understand_system(
        "Authentication",
        "JWT-based auth with refresh tokens. 15-minute expiry.",
        vec!["UserDB".to_string(), "RedisCache".to_string()],
        true,
    )?;
    engine.milestone(
        "Framework Mastery",
        "Understood the core event loop of the application",
        "Optimized throughput by 20%",
        true,
    )?;

    println!("{}", "Session Reflection:".bold());
    let reflection = serde_json::to_value(engine.reflect())?;
    if let Value::Object(fields) = reflection {
        for (key, value) in fields {
            println!("  {}: {}", key, value);
        }
    }

    println!();
    println!("{}", "=".repeat(70));
    println!("{}", engine.continuity_context());
    println!("{}", "=".repeat(70));

    let report = engine.verify_current_session()?;
    println!();
    println!(
        "{} Session log: {} ({} entries, integrity {})",
        "✓".bright_green(),
        engine.session_file().display(),
        report.total_entries,
        report.integrity_rate
    );
    println!(
        "{} Evolution data: {}",
        "✓".bright_green(),
        engine.evolution_file().display()
    );
    Ok(())
}
