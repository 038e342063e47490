//! Rule-based shot scoring.
//!
//! Detections are grouped into fixed-size blocks, each treated as one shot.
//! Every shot starts at 100 and loses points per detected problem.

use anyhow::Result;
use async_trait::async_trait;

use super::Evaluator;
use crate::domain::{Detection, Evaluation};

/// Detections per shot
pub const SHOT_SIZE: usize = 10;

/// Acceptable mean racket angle range, in degrees
pub const ANGLE_RANGE: (f64, f64) = (30.0, 110.0);

/// Elbow this many pixels above the shoulder counts as "high"
pub const ELBOW_RISE_PX: f64 = 30.0;

pub const ISSUE_ANGLE_UNDETECTED: &str = "Racket angle undetected in this sequence";
pub const ISSUE_ELBOW_HIGH: &str = "Elbow appears high for some frames (may reduce control)";
pub const SUGGEST_OPEN_FACE: &str =
    "Experiment with a more open racket face around 45°–80° at contact";
pub const SUGGEST_ALIGNMENT: &str = "Work on shoulder-elbow-wrist alignment drills";

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedEvaluator;

impl RuleBasedEvaluator {
    pub fn score(&self, detections: &[Detection]) -> Vec<Evaluation> {
        detections
            .chunks(SHOT_SIZE)
            .enumerate()
            .map(|(shot_id, block)| score_block(shot_id, block))
            .collect()
    }
}

#[async_trait]
impl Evaluator for RuleBasedEvaluator {
    async fn evaluate(&self, detections: &[Detection]) -> Result<Vec<Evaluation>> {
        Ok(self.score(detections))
    }
}

fn score_block(shot_id: usize, block: &[Detection]) -> Evaluation {
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();
    let mut score = 100.0;

    let angles: Vec<f64> = block.iter().filter_map(|d| d.racket_angle).collect();
    let avg_angle = (!angles.is_empty()).then(|| angles.iter().sum::<f64>() / angles.len() as f64);

    match avg_angle {
        None => {
            issues.push(ISSUE_ANGLE_UNDETECTED.to_string());
            score -= 30.0;
        }
        Some(angle) if angle < ANGLE_RANGE.0 || angle > ANGLE_RANGE.1 => {
            issues.push(format!("Racket angle ({:.1}°) might be suboptimal", angle));
            suggestions.push(SUGGEST_OPEN_FACE.to_string());
            score -= 20.0;
        }
        Some(_) => {}
    }

    // Image y grows downward, so a raised elbow has the smaller y
    let elbow_high = block.iter().any(|d| {
        match (d.keypoints.get("left_elbow"), d.keypoints.get("left_shoulder")) {
            (Some(elbow), Some(shoulder)) => elbow[1] < shoulder[1] - ELBOW_RISE_PX,
            _ => false,
        }
    });
    if elbow_high {
        issues.push(ISSUE_ELBOW_HIGH.to_string());
        suggestions.push(SUGGEST_ALIGNMENT.to_string());
        score -= 10.0;
    }

    Evaluation {
        shot_id,
        score: f64::max(score, 0.0),
        issues,
        suggestions,
        avg_angle,
        frames: block.iter().map(|d| d.frame_index).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(frame_index: usize, angle: Option<f64>) -> Detection {
        Detection {
            frame_index,
            timestamp: 0.0,
            racket_angle: angle,
            keypoints: Default::default(),
        }
    }

    #[test]
    fn test_groups_into_shots() {
        let detections: Vec<Detection> = (0..25).map(|i| detection(i, Some(60.0))).collect();
        let evaluations = RuleBasedEvaluator.score(&detections);

        assert_eq!(evaluations.len(), 3);
        assert_eq!(evaluations[2].shot_id, 2);
        assert_eq!(evaluations[2].frames, vec![20, 21, 22, 23, 24]);
        assert_eq!(evaluations[0].score, 100.0);
        assert!(evaluations[0].issues.is_empty());
    }

    #[test]
    fn test_missing_angle() {
        let evaluations = RuleBasedEvaluator.score(&[detection(0, None)]);

        assert_eq!(evaluations[0].score, 70.0);
        assert_eq!(evaluations[0].issues, vec![ISSUE_ANGLE_UNDETECTED.to_string()]);
        assert!(evaluations[0].avg_angle.is_none());
    }

    #[test]
    fn test_suboptimal_angle_and_high_elbow() {
        let mut raised = detection(1, Some(10.0));
        raised.keypoints.insert("left_elbow".to_string(), [100.0, 100.0]);
        raised.keypoints.insert("left_shoulder".to_string(), [120.0, 200.0]);

        let evaluations = RuleBasedEvaluator.score(&[detection(0, Some(20.0)), raised]);
        let shot = &evaluations[0];

        assert_eq!(shot.score, 70.0);
        assert_eq!(shot.avg_angle, Some(15.0));
        assert_eq!(shot.issues[0], "Racket angle (15.0°) might be suboptimal");
        assert_eq!(shot.issues[1], ISSUE_ELBOW_HIGH);
        assert_eq!(shot.suggestions, vec![SUGGEST_OPEN_FACE, SUGGEST_ALIGNMENT]);
    }
}
