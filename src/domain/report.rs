//! Final pipeline report.

use serde::{Deserialize, Serialize};

use super::analysis::{CoachingPlan, Diagnosis, Evaluation};

/// Aggregate result of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub session_id: String,

    /// Number of detection records produced by the detect stage
    pub detections_count: usize,

    pub evaluations: Vec<Evaluation>,

    pub diagnosis: Diagnosis,

    pub plan: CoachingPlan,

    /// Describes the session's most recent event before this run finished
    pub resume_hint: Option<String>,
}

impl Report {
    /// All issues across evaluations, in order, with repeats
    pub fn issues(&self) -> Vec<String> {
        self.evaluations
            .iter()
            .flat_map(|e| e.issues.iter().cloned())
            .collect()
    }
}
