//! Stage collaborators.
//!
//! The orchestrator only sees these traits. Concrete adapters wrap an
//! external command (detection extractor, text generator), a file on disk,
//! or pure scoring rules.

pub mod coach;
pub mod detector;
pub mod evaluator;
pub mod generator;
mod process;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CoachingPlan, Detection, Diagnosis, Evaluation, UserProfile};
use crate::tools::EvidenceContext;

pub use coach::LlmCoach;
pub use detector::{CommandDetector, ReplayDetector};
pub use evaluator::RuleBasedEvaluator;
pub use generator::CommandGenerator;

/// Bounds on how much of a clip the detect stage processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionLimits {
    /// Maximum number of sampled frames
    pub max_frames: usize,

    /// Keep every n-th frame
    pub frame_stride: usize,
}

impl Default for DetectionLimits {
    fn default() -> Self {
        Self {
            max_frames: 200,
            frame_stride: 3,
        }
    }
}

/// Failure of the text generation capability
#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    #[error("Generator unavailable: {0}")]
    Unavailable(String),
}

/// Opaque text-in, text-out generation (an LLM behind some transport)
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable generator name
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Stage 1: media -> per-frame detections
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, media_path: &Path, limits: DetectionLimits) -> Result<Vec<Detection>>;
}

/// Stage 2: detections -> scored shots
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, detections: &[Detection]) -> Result<Vec<Evaluation>>;
}

/// Stage 4: evaluations (+ diagnosis) -> coaching plan
#[async_trait]
pub trait Coach: Send + Sync {
    async fn coach(
        &self,
        evaluations: &[Evaluation],
        profile: &UserProfile,
        evidence: &EvidenceContext,
        diagnosis: Option<&Diagnosis>,
    ) -> Result<CoachingPlan>;
}

/// Strip one enclosing markdown code fence (with optional language tag)
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return trimmed,
    };
    let body = match body.rfind("```") {
        Some(idx) => &body[..idx],
        None => body,
    };
    body.trim()
}
