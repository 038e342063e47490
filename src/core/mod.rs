//! Core orchestration logic.
//!
//! This module contains:
//! - SessionStore: Durable session records and event logs
//! - StageCache: Per-session stage outputs for resume
//! - DiagnosticLoop: Schema-enforcing retry loop around the generator
//! - Orchestrator: Main execution engine

pub mod diagnosis;
pub mod orchestrator;
pub mod session_store;
pub mod stage_cache;
pub mod telemetry;

// Re-export commonly used types
pub use diagnosis::{DiagnosticLoop, SchemaViolation};
pub use orchestrator::{Orchestrator, StageSet};
pub use session_store::SessionStore;
pub use stage_cache::StageCache;
pub use telemetry::TimedSpan;
