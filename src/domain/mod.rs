//! Domain types for strokelab.
//!
//! This module contains the core data structures:
//! - Session: records, profiles, and their event logs
//! - Stage: pipeline phases and the failure marker
//! - Analysis: per-stage payloads
//! - Report: the assembled run result

pub mod analysis;
pub mod events;
pub mod report;
pub mod session;
pub mod stage;

// Re-export commonly used types
pub use analysis::{CoachingPlan, Detection, Diagnosis, Evaluation, Insights, PlanDrill, ScheduleEntry};
pub use events::{SessionEvent, PIPELINE_COMPLETE};
pub use report::Report;
pub use session::{generate_session_id, SessionRecord, UserProfile};
pub use stage::{Stage, StageFailure};
