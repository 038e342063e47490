//! Technique breakdown: score statistics and issue frequency.

use serde::{Deserialize, Serialize};

use crate::domain::Evaluation;

/// Registry name of the breakdown tool
pub const NAME: &str = "technique_breakdown";

pub const DESCRIPTION: &str = "Aggregates evaluation outputs to highlight scoring trends, \
     dominant issues, and consistency metrics.";

/// Arguments accepted through the registry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BreakdownArgs {
    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
}

/// Summary statistics over shot scores. All fields are `None` when there
/// are no scores; `stdev` also needs at least two.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub average: Option<f64>,
    pub stdev: Option<f64>,
    pub best: Option<f64>,
    pub worst: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCount {
    pub issue: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueBreakdown {
    pub score_summary: ScoreSummary,

    /// Descending by count; ties keep first-seen order
    pub top_issues: Vec<IssueCount>,

    /// Total frames covered by all evaluations
    pub frames_analyzed: usize,
}

/// Stateless statistics tool
#[derive(Debug, Clone, Copy, Default)]
pub struct TechniqueBreakdownTool;

impl TechniqueBreakdownTool {
    pub fn run(&self, evaluations: &[Evaluation]) -> TechniqueBreakdown {
        let scores: Vec<f64> = evaluations
            .iter()
            .map(|e| e.score)
            .filter(|s| s.is_finite())
            .collect();

        TechniqueBreakdown {
            score_summary: summarize(&scores),
            top_issues: rank_issues(evaluations),
            frames_analyzed: evaluations.iter().map(|e| e.frames.len()).sum(),
        }
    }
}

fn summarize(scores: &[f64]) -> ScoreSummary {
    if scores.is_empty() {
        return ScoreSummary {
            count: 0,
            average: None,
            stdev: None,
            best: None,
            worst: None,
        };
    }

    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let stdev = (scores.len() > 1).then(|| {
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        round2(variance.sqrt())
    });

    ScoreSummary {
        count: scores.len(),
        average: Some(round2(mean)),
        stdev,
        best: scores.iter().copied().reduce(f64::max),
        worst: scores.iter().copied().reduce(f64::min),
    }
}

/// Count issues, keeping first-seen order for ties
pub fn rank_issues(evaluations: &[Evaluation]) -> Vec<IssueCount> {
    let mut counts: Vec<IssueCount> = Vec::new();

    for issue in evaluations.iter().flat_map(|e| e.issues.iter()) {
        match counts.iter_mut().find(|c| &c.issue == issue) {
            Some(entry) => entry.count += 1,
            None => counts.push(IssueCount {
                issue: issue.clone(),
                count: 1,
            }),
        }
    }

    // stable sort
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
