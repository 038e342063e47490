//! Generator-backed coaching plans.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use super::{strip_code_fence, Coach, Generator};
use crate::domain::{CoachingPlan, Diagnosis, Evaluation, UserProfile};
use crate::tools::EvidenceContext;

/// Evaluations embedded in the coaching prompt
pub const EVAL_LIMIT: usize = 12;

const COACH_RULES: &str = r#"You are an elite table-tennis coach. Follow these rules exactly:
1. The response MUST be a single JSON object, with no markdown and no conversation.
2. Required schema:
{
  "summary": "one concise paragraph",
  "drills": [
    {"name": "", "description": "", "focus": "", "repetitions": ""}
  ],
  "schedule": [
    {"day": 1, "focus": ""},
    {"day": 3, "focus": ""},
    {"day": 5, "focus": ""}
  ]
}
3. Every drill and schedule entry must reference insights or issues from tool_context/evaluations.
4. Use specific numbers/reps; avoid generic advice.
5. Violating the schema or adding extra text makes the answer invalid."#;

/// Asks a [`Generator`] for a plan in one shot
pub struct LlmCoach {
    generator: Arc<dyn Generator>,
}

impl LlmCoach {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub fn build_prompt(
        evaluations: &[Evaluation],
        profile: &UserProfile,
        evidence: &EvidenceContext,
        diagnosis: Option<&Diagnosis>,
    ) -> Result<String> {
        let samples = &evaluations[..evaluations.len().min(EVAL_LIMIT)];
        let payload = json!({
            "system_rules": COACH_RULES,
            "user_profile": profile,
            "evaluation_samples": samples,
            "tool_context": evidence,
            "insights_summary": diagnosis.map(|d| &d.payload),
        });
        serde_json::to_string_pretty(&payload).context("Failed to build coaching prompt")
    }
}

#[async_trait]
impl Coach for LlmCoach {
    async fn coach(
        &self,
        evaluations: &[Evaluation],
        profile: &UserProfile,
        evidence: &EvidenceContext,
        diagnosis: Option<&Diagnosis>,
    ) -> Result<CoachingPlan> {
        let prompt = Self::build_prompt(evaluations, profile, evidence, diagnosis)?;
        let response = self.generator.generate(&prompt).await?;

        serde_json::from_str(strip_code_fence(&response))
            .with_context(|| format!("Coaching response is not a valid plan: {}", response.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::GenerateError;

    struct Canned(&'static str);

    #[async_trait]
    impl Generator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Ok(self.0.to_string())
        }
    }

    fn evaluations(n: usize) -> Vec<Evaluation> {
        (0..n)
            .map(|i| Evaluation {
                shot_id: i,
                score: 90.0,
                issues: Vec::new(),
                suggestions: Vec::new(),
                avg_angle: None,
                frames: Vec::new(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_parses_fenced_plan() {
        let coach = LlmCoach::new(Arc::new(Canned(
            "```json\n{\"summary\": \"Open the face\", \"drills\": [{\"name\": \"Open-Face Progression\", \"description\": \"d\", \"focus\": \"angle\", \"repetitions\": \"5x15\"}], \"schedule\": [{\"day\": 1, \"focus\": \"angle\"}]}\n```",
        )));

        let plan = coach
            .coach(&evaluations(1), &UserProfile::new(), &EvidenceContext::default(), None)
            .await
            .unwrap();

        assert_eq!(plan.summary, "Open the face");
        assert_eq!(plan.drills[0].repetitions, "5x15");
        assert_eq!(plan.schedule[0].day, 1);
    }

    #[tokio::test]
    async fn test_invalid_plan_is_error() {
        let coach = LlmCoach::new(Arc::new(Canned("sure, here is a plan")));
        let result = coach
            .coach(&evaluations(1), &UserProfile::new(), &EvidenceContext::default(), None)
            .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_prompt_truncates_evaluations() {
        let prompt = LlmCoach::build_prompt(
            &evaluations(20),
            &UserProfile::new(),
            &EvidenceContext::default(),
            None,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&prompt).unwrap();
        assert_eq!(value["evaluation_samples"].as_array().unwrap().len(), EVAL_LIMIT);
        assert!(value["insights_summary"].is_null());
    }
}
