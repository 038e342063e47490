//! Stage payloads: detections, evaluations, diagnoses, and coaching plans.
//!
//! These are what the stage cache persists, so every type here
//! round-trips through JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-frame detection produced by the detect stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Index of the sampled frame
    pub frame_index: usize,

    /// Seconds from the start of the clip
    #[serde(default)]
    pub timestamp: f64,

    /// Racket angle proxy in degrees (0-180), when one was found
    #[serde(default)]
    pub racket_angle: Option<f64>,

    /// Landmark name -> [x, y] in pixel coordinates
    #[serde(default)]
    pub keypoints: BTreeMap<String, [f64; 2]>,
}

/// Scored shot produced by the evaluate stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub shot_id: usize,

    pub score: f64,

    #[serde(default)]
    pub issues: Vec<String>,

    #[serde(default)]
    pub suggestions: Vec<String>,

    #[serde(default)]
    pub avg_angle: Option<f64>,

    /// Frame indices covered by this shot
    #[serde(default)]
    pub frames: Vec<usize>,
}

/// Schema-conformant diagnostic payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub hypothesis: String,
    pub evidence: Vec<String>,
    pub confidence: f64,
}

/// Output of the diagnose stage.
///
/// `payload` is the last candidate the generator produced. It only
/// conforms to the [`Insights`] schema when `retry_budget_exceeded` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub payload: Value,

    /// Number of generate calls made
    pub attempts: u32,

    #[serde(default)]
    pub retry_budget_exceeded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
}

impl Diagnosis {
    /// Typed view of the payload, only for validated diagnoses
    pub fn insights(&self) -> Option<Insights> {
        if self.retry_budget_exceeded {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// A drill within a coaching plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDrill {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub focus: String,
    #[serde(default)]
    pub repetitions: String,
}

/// A day in the practice schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub day: u32,
    pub focus: String,
}

/// Output of the coach stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachingPlan {
    pub summary: String,
    #[serde(default)]
    pub drills: Vec<PlanDrill>,
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
}
