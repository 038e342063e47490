//! Counting fakes for the stage collaborators.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use strokelab::adapters::{
    Coach, DetectionLimits, Detector, Evaluator, GenerateError, Generator, RuleBasedEvaluator,
};
use strokelab::core::StageSet;
use strokelab::domain::{CoachingPlan, Detection, Diagnosis, Evaluation, PlanDrill, ScheduleEntry, UserProfile};
use strokelab::tools::EvidenceContext;

pub const VALID_DIAGNOSIS: &str =
    r#"{"hypothesis": "Closed racket face", "evidence": ["all shots flagged"], "confidence": 0.8}"#;

#[derive(Default)]
pub struct Counters {
    pub detect: AtomicUsize,
    pub evaluate: AtomicUsize,
    pub generate: AtomicUsize,
    pub coach: AtomicUsize,
    /// Coach fails while set
    pub coach_fails: AtomicBool,
}

impl Counters {
    pub fn calls(&self) -> [usize; 4] {
        [
            self.detect.load(Ordering::SeqCst),
            self.evaluate.load(Ordering::SeqCst),
            self.generate.load(Ordering::SeqCst),
            self.coach.load(Ordering::SeqCst),
        ]
    }
}

/// Emits `frames` detections with no racket angle
pub struct FakeDetector {
    pub counters: Arc<Counters>,
    pub frames: usize,
}

#[async_trait]
impl Detector for FakeDetector {
    async fn detect(&self, _media_path: &Path, limits: DetectionLimits) -> Result<Vec<Detection>> {
        self.counters.detect.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.frames.min(limits.max_frames))
            .map(|i| Detection {
                frame_index: i,
                timestamp: i as f64 / 30.0,
                racket_angle: None,
                keypoints: Default::default(),
            })
            .collect())
    }
}

pub struct FakeEvaluator {
    pub counters: Arc<Counters>,
}

#[async_trait]
impl Evaluator for FakeEvaluator {
    async fn evaluate(&self, detections: &[Detection]) -> Result<Vec<Evaluation>> {
        self.counters.evaluate.fetch_add(1, Ordering::SeqCst);
        Ok(RuleBasedEvaluator.score(detections))
    }
}

pub struct FakeGenerator {
    pub counters: Arc<Counters>,
}

#[async_trait]
impl Generator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        self.counters.generate.fetch_add(1, Ordering::SeqCst);
        Ok(VALID_DIAGNOSIS.to_string())
    }
}

pub struct FakeCoach {
    pub counters: Arc<Counters>,
}

#[async_trait]
impl Coach for FakeCoach {
    async fn coach(
        &self,
        evaluations: &[Evaluation],
        _profile: &UserProfile,
        _evidence: &EvidenceContext,
        _diagnosis: Option<&Diagnosis>,
    ) -> Result<CoachingPlan> {
        self.counters.coach.fetch_add(1, Ordering::SeqCst);
        if self.counters.coach_fails.load(Ordering::SeqCst) {
            anyhow::bail!("coach backend offline");
        }

        Ok(CoachingPlan {
            summary: format!("{} shots reviewed", evaluations.len()),
            drills: vec![PlanDrill {
                name: "Open-Face Progression".to_string(),
                description: "Shadow strokes with an open face".to_string(),
                focus: "racket angle".to_string(),
                repetitions: "5x15".to_string(),
            }],
            schedule: vec![ScheduleEntry {
                day: 1,
                focus: "racket angle".to_string(),
            }],
        })
    }
}

pub fn fake_stages(frames: usize) -> (StageSet, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let stages = StageSet {
        detector: Arc::new(FakeDetector {
            counters: counters.clone(),
            frames,
        }),
        evaluator: Arc::new(FakeEvaluator {
            counters: counters.clone(),
        }),
        generator: Arc::new(FakeGenerator {
            counters: counters.clone(),
        }),
        coach: Arc::new(FakeCoach {
            counters: counters.clone(),
        }),
    };
    (stages, counters)
}
