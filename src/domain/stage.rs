//! Pipeline stages.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One phase of the analysis pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pose/racket detection over sampled frames
    Detect,

    /// Rule-based scoring of detections
    Evaluate,

    /// Validated diagnostic hypothesis
    Diagnose,

    /// Coaching plan generation
    Coach,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 4] = [Stage::Detect, Stage::Evaluate, Stage::Diagnose, Stage::Coach];

    /// Name used for cache files and session event types
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Detect => "detection",
            Stage::Evaluate => "evaluation",
            Stage::Diagnose => "diagnosis",
            Stage::Coach => "coaching",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context attached to any error raised by a stage function.
///
/// Callers recover the failing stage with
/// `err.downcast_ref::<StageFailure>()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{stage} stage failed")]
pub struct StageFailure {
    pub stage: Stage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names_are_unique() {
        let names: std::collections::HashSet<&str> =
            Stage::ALL.iter().map(Stage::as_str).collect();
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_stage_failure_downcast() {
        let err = anyhow::anyhow!("boom").context(StageFailure {
            stage: Stage::Evaluate,
        });

        assert_eq!(err.to_string(), "evaluation stage failed");
        let failure = err.downcast_ref::<StageFailure>().unwrap();
        assert_eq!(failure.stage, Stage::Evaluate);
        assert_eq!(err.root_cause().to_string(), "boom");
    }
}
