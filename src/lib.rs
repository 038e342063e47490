//! strokelab - Resumable stroke-technique analysis pipeline
//!
//! Analyzes short table-tennis clips in four stages and keeps enough state
//! on disk to pick a session back up after a failure.
//!
//! # Architecture
//!
//! - Detect → evaluate → diagnose → coach, run strictly in order
//! - Every stage output is cached per session; resumed runs skip cached stages
//! - Session records (profile, event log, last result) persist across restarts
//! - The diagnosis is schema-checked and retried with targeted feedback
//!
//! # Modules
//!
//! - `adapters`: Stage collaborators (detectors, evaluator, coach, generator)
//! - `core`: Orchestration logic (SessionStore, StageCache, DiagnosticLoop)
//! - `domain`: Data structures (SessionRecord, Evaluation, Report)
//! - `tools`: Evidence tools and registry
//! - `harness`: Batch evaluation with precision/recall/F1
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Analyze a clip (reads rally.mp4.detections.json unless a detector is configured)
//! strokelab analyze rally.mp4 --profile level=Advanced
//!
//! # Pick a failed session back up
//! strokelab analyze rally.mp4 --session <id> --resume
//!
//! # Score a labelled manifest
//! strokelab evaluate --manifest samples.json
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod harness;
pub mod tools;

// Re-export main types at crate root for convenience
pub use config::ResolvedConfig;
pub use core::{Orchestrator, SessionStore, StageSet};
pub use domain::{Report, SessionRecord, Stage, StageFailure, UserProfile};
pub use tools::{ToolError, ToolRegistry};
