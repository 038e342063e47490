//! Command-line interface for strokelab.
//!
//! Provides commands for analyzing clips, inspecting sessions, running the
//! batch evaluation harness, and showing the resolved configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::core::{Orchestrator, SessionStore, StageSet};
use crate::domain::{Report, StageFailure, UserProfile};
use crate::harness;

/// strokelab - Resumable stroke-technique analysis pipeline
#[derive(Parser, Debug)]
#[command(name = "strokelab")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a clip
    Analyze {
        /// Media file (or a detections .json file)
        media: PathBuf,

        /// Session to run in (a new one is created if unknown)
        #[arg(short, long)]
        session: Option<String>,

        /// Reuse cached stage outputs from earlier runs of the session
        #[arg(long)]
        resume: bool,

        /// Profile fields, e.g. --profile level=Advanced
        #[arg(short, long = "profile", value_parser = parse_profile_field)]
        profile: Vec<(String, String)>,
    },

    /// Show a session's profile, events and resume hint
    Status {
        /// Session ID
        session_id: String,
    },

    /// List recent sessions
    Sessions {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Score detected issues against a labelled manifest
    #[command(group(ArgGroup::new("source").required(true).args(["manifest", "mock"])))]
    Evaluate {
        /// JSON list of {video, expected_issues, user_profile}
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Score synthetic evaluations instead (no media needed)
        #[arg(long)]
        mock: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Analyze {
                media,
                session,
                resume,
                profile,
            } => analyze(media, session, resume, profile).await,
            Commands::Status { session_id } => show_status(&session_id).await,
            Commands::Sessions { limit } => list_sessions(limit).await,
            Commands::Evaluate { manifest, mock } => evaluate(manifest, mock).await,
            Commands::Config => show_config(),
        }
    }
}

/// Parse a single `key=value` profile field
fn parse_profile_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("Expected key=value, got '{}'", raw)),
    }
}

async fn open_store(config: &ResolvedConfig) -> Result<Arc<SessionStore>> {
    Ok(Arc::new(SessionStore::open(&config.session_store).await?))
}

fn build_orchestrator(config: &ResolvedConfig, store: Arc<SessionStore>) -> Orchestrator {
    Orchestrator::new(store, &config.cache_root, StageSet::from_config(config))
        .with_limits(config.limits())
}

/// Run the pipeline for one clip
async fn analyze(
    media: PathBuf,
    session_id: Option<String>,
    resume: bool,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let config = ResolvedConfig::load()?;
    let store = open_store(&config).await?;

    let profile: UserProfile = fields
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    let session = store
        .ensure_session(session_id.as_deref(), Some(profile))
        .await?;

    if let Some(requested) = session_id.as_deref() {
        if requested != session.session_id {
            eprintln!(
                "[Session '{}' not found, started new session {}]",
                requested, session.session_id
            );
        }
    }

    let orchestrator = build_orchestrator(&config, store);
    match orchestrator.run(&media, &session, resume).await {
        Ok(report) => {
            print_report(&report)?;
            Ok(())
        }
        Err(err) => {
            let Some(stage) = err.downcast_ref::<StageFailure>().map(|f| f.stage) else {
                return Err(err);
            };
            eprintln!("\n[{:#}]", err);
            eprintln!(
                "[Stages before '{}' are cached. Re-run with --session {} --resume to continue]",
                stage, session.session_id
            );
            std::process::exit(1);
        }
    }
}

fn print_report(report: &Report) -> Result<()> {
    let rendered = serde_json::to_string_pretty(report).context("Failed to render report")?;
    println!("{}", rendered);

    if report.diagnosis.retry_budget_exceeded {
        eprintln!(
            "\n[Degraded result: diagnosis did not validate after {} attempts ({})]",
            report.diagnosis.attempts,
            report.diagnosis.validation_error.as_deref().unwrap_or("no reason recorded")
        );
    }
    eprintln!("\n[Session {} completed successfully]", report.session_id);
    Ok(())
}

/// Show a single session
async fn show_status(session_id: &str) -> Result<()> {
    let config = ResolvedConfig::load()?;
    let store = open_store(&config).await?;

    let record = store
        .get(session_id)
        .await
        .with_context(|| format!("Session not found: {}", session_id))?;

    println!("Session ID: {}", record.session_id);
    println!("Created: {}", record.created_at);
    println!("Updated: {}", record.updated_at);
    println!("Last result: {}", if record.last_result.is_some() { "stored" } else { "none" });
    if let Some(hint) = record.resume_hint() {
        println!("Resume hint: {}", hint);
    }

    println!("\nProfile:");
    if record.user_profile.is_empty() {
        println!("  (empty)");
    }
    for (key, value) in record.user_profile.iter() {
        println!("  {}: {}", key, value);
    }

    println!("\nEvents:");
    for event in &record.events {
        println!("  {}  {}", event.timestamp.format("%Y-%m-%d %H:%M:%S"), event.event_type);
    }

    Ok(())
}

/// List recent sessions
async fn list_sessions(limit: usize) -> Result<()> {
    let config = ResolvedConfig::load()?;
    let store = open_store(&config).await?;
    let sessions = store.list().await;

    if sessions.is_empty() {
        println!("No sessions found");
        return Ok(());
    }

    println!("{:<14} {:<21} {:<8} {:<20}", "SESSION ID", "UPDATED", "EVENTS", "LAST EVENT");
    println!("{}", "-".repeat(66));

    for record in sessions.into_iter().take(limit) {
        let last_event = record
            .events
            .last()
            .map(|e| e.event_type.as_str())
            .unwrap_or("-");
        println!(
            "{:<14} {:<21} {:<8} {:<20}",
            record.session_id,
            record.updated_at.format("%Y-%m-%d %H:%M:%S"),
            record.events.len(),
            last_event
        );
    }

    Ok(())
}

/// Run the batch harness and save its report
async fn evaluate(manifest: Option<PathBuf>, mock: bool) -> Result<()> {
    let config = ResolvedConfig::load()?;

    let report = match manifest {
        Some(path) if !mock => {
            let samples = harness::load_manifest(&path).await?;
            let store = open_store(&config).await?;
            let orchestrator = build_orchestrator(&config, store);
            harness::run_manifest(&orchestrator, &samples).await?
        }
        _ => harness::run_mock(),
    };

    let path = harness::save_report(&report, &config.reports_dir).await?;
    println!("{}", serde_json::to_string_pretty(&harness::summarize(&report))?);
    eprintln!("\n[Evaluation report saved to {}]", path.display());
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = ResolvedConfig::load()?;

    println!("strokelab configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:          {}", cfg.home.display());
    println!("  Session store: {}", cfg.session_store.display());
    println!("  Stage cache:   {}", cfg.cache_root.display());
    println!("  Reports:       {}", cfg.reports_dir.display());
    println!();
    println!("Generator:");
    println!("  Command: {}", cfg.generator.command.join(" "));
    println!("  Timeout: {}s", cfg.generator.timeout_seconds);
    println!();
    println!("Detector:");
    match &cfg.detector.command {
        Some(argv) => println!("  Command: {}", argv.join(" ")),
        None => println!("  Command: (none - replaying <media>.detections.json)"),
    }
    println!("  Timeout:      {}s", cfg.detector.timeout_seconds);
    println!("  Max frames:   {}", cfg.detector.max_frames);
    println!("  Frame stride: {}", cfg.detector.frame_stride);

    Ok(())
}
