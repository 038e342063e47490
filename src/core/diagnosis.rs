//! Bounded self-critique loop around the diagnostic generator call.
//!
//! Each attempt builds a prompt from the evaluation sample, profile, and
//! evidence context, asks the generator for a diagnosis, and validates the
//! answer against the [`Insights`] schema. A rejected attempt is fed back to
//! the next one with the exact reason it failed. When every attempt is
//! rejected the loop still returns, with the last candidate flagged as
//! having exhausted the retry budget.

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::adapters::{strip_code_fence, GenerateError, Generator};
use crate::domain::{Diagnosis, Evaluation, Insights, UserProfile};
use crate::tools::EvidenceContext;

/// Upper bound on generate calls per diagnosis
pub const MAX_ATTEMPTS: u32 = 3;

/// Evaluations embedded in the prompt
pub const EVALUATION_SAMPLE_LIMIT: usize = 10;

pub const BUDGET_EXCEEDED: &str = "Exceeded retry budget while enforcing schema";

const DIAGNOSTIC_RULES: &str = r#"You are a table-tennis diagnostics specialist. Produce JSON only, no markdown.
Schema:
{
  "hypothesis": "short paragraph",
  "evidence": ["bullet point", "..."],
  "confidence": 0.0
}
Rules:
- Evidence bullets must reference concrete stats or issues from tool_context/evaluations.
- confidence is a float between 0 and 1 (inclusive) with one decimal place.
- If you fail to follow the schema, the supervisor will resend your previous answer with a correction. Fix it."#;

/// Why a candidate was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaViolation {
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Response must be a JSON object.")]
    NotAnObject,

    #[error("Missing hypothesis text.")]
    MissingHypothesis,

    #[error("Evidence must be a non-empty list of strings.")]
    InvalidEvidence,

    #[error("Confidence must be between 0 and 1.")]
    ConfidenceOutOfRange,
}

/// One generate call and its verdict. Never outlives the loop.
#[derive(Debug, Clone)]
pub struct DiagnosticAttempt {
    pub number: u32,
    pub raw: String,
    pub parsed: Option<Value>,
    pub verdict: Result<Insights, SchemaViolation>,
}

impl DiagnosticAttempt {
    fn evaluate(number: u32, raw: String) -> Self {
        let parsed = serde_json::from_str::<Value>(strip_code_fence(&raw));
        let (parsed, verdict) = match parsed {
            Ok(value) => {
                let verdict = validate(&value);
                (Some(value), verdict)
            }
            Err(e) => (None, Err(SchemaViolation::Malformed(e.to_string()))),
        };

        Self {
            number,
            raw,
            parsed,
            verdict,
        }
    }

    /// What the next prompt echoes back as the previous answer
    fn previous_response(&self) -> Value {
        self.parsed
            .clone()
            .unwrap_or_else(|| Value::String(self.raw.clone()))
    }
}

/// Check a candidate against the diagnosis schema
pub fn validate(payload: &Value) -> Result<Insights, SchemaViolation> {
    let object = payload.as_object().ok_or(SchemaViolation::NotAnObject)?;

    let hypothesis = match object.get("hypothesis").and_then(Value::as_str) {
        Some(h) if !h.is_empty() => h.to_string(),
        _ => return Err(SchemaViolation::MissingHypothesis),
    };

    let evidence = object
        .get("evidence")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty())
        .and_then(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<String>>>()
        })
        .ok_or(SchemaViolation::InvalidEvidence)?;

    let confidence = object
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| (0.0..=1.0).contains(c))
        .ok_or(SchemaViolation::ConfidenceOutOfRange)?;

    Ok(Insights {
        hypothesis,
        evidence,
        confidence,
    })
}

/// Placeholder returned when no attempt produced parseable JSON
pub fn empty_payload() -> Value {
    json!({"hypothesis": "", "evidence": [], "confidence": 0.0})
}

/// Retry loop over a borrowed generator
pub struct DiagnosticLoop<'a> {
    generator: &'a dyn Generator,
    max_attempts: u32,
}

impl<'a> DiagnosticLoop<'a> {
    pub fn new(generator: &'a dyn Generator) -> Self {
        Self {
            generator,
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Build the prompt for one attempt
    pub fn build_prompt(
        evaluations: &[Evaluation],
        profile: &UserProfile,
        evidence: &EvidenceContext,
        previous: Option<&DiagnosticAttempt>,
    ) -> String {
        let samples = &evaluations[..evaluations.len().min(EVALUATION_SAMPLE_LIMIT)];
        let mut payload = json!({
            "system_rules": DIAGNOSTIC_RULES,
            "user_profile": profile,
            "evaluation_samples": samples,
            "tool_context": evidence,
        });

        if let (Some(attempt), Some(object)) = (previous, payload.as_object_mut()) {
            if let Err(reason) = &attempt.verdict {
                object.insert(
                    "feedback".to_string(),
                    Value::String(format!("Attempt {} was invalid: {}", attempt.number, reason)),
                );
                object.insert("previous_response".to_string(), attempt.previous_response());
            }
        }

        // Serializing a Value tree cannot fail
        serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
    }

    /// Run until a candidate validates or the budget is spent.
    ///
    /// Only generator unavailability is an error; schema failures are
    /// retried and finally reported through the returned [`Diagnosis`].
    pub async fn run(
        &self,
        evaluations: &[Evaluation],
        profile: &UserProfile,
        evidence: &EvidenceContext,
    ) -> Result<Diagnosis, GenerateError> {
        let mut previous: Option<DiagnosticAttempt> = None;
        // Last candidate that parsed, with the reason it was rejected
        let mut last_parsed: Option<(Value, String)> = None;

        for number in 1..=self.max_attempts {
            let prompt = Self::build_prompt(evaluations, profile, evidence, previous.as_ref());
            let raw = self.generator.generate(&prompt).await?;
            let attempt = DiagnosticAttempt::evaluate(number, raw);

            match &attempt.verdict {
                Ok(insights) => {
                    debug!(attempt = number, confidence = insights.confidence, "Diagnosis validated");
                    return Ok(Diagnosis {
                        payload: attempt.parsed.unwrap_or_else(empty_payload),
                        attempts: number,
                        retry_budget_exceeded: false,
                        validation_error: None,
                    });
                }
                Err(reason) => {
                    warn!(attempt = number, %reason, "Diagnosis rejected");
                    if let Some(parsed) = &attempt.parsed {
                        last_parsed = Some((parsed.clone(), reason.to_string()));
                    }
                }
            }
            previous = Some(attempt);
        }

        // Report the reason that belongs to the returned payload
        let (payload, last_reason) = last_parsed.unwrap_or_else(|| {
            let reason = previous
                .as_ref()
                .and_then(|a| a.verdict.as_ref().err())
                .map(ToString::to_string)
                .unwrap_or_default();
            (empty_payload(), reason)
        });

        Ok(Diagnosis {
            payload,
            attempts: self.max_attempts,
            retry_budget_exceeded: true,
            validation_error: Some(format!("{}: {}", BUDGET_EXCEEDED, last_reason)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_schema() {
        let insights = validate(&json!({
            "hypothesis": "Closed racket face",
            "evidence": ["3 of 4 shots flagged"],
            "confidence": 1
        }))
        .unwrap();

        assert_eq!(insights.confidence, 1.0);
        assert_eq!(insights.evidence.len(), 1);
    }

    #[test]
    fn test_validate_rejections() {
        assert_eq!(validate(&json!([1])), Err(SchemaViolation::NotAnObject));
        assert_eq!(
            validate(&json!({"hypothesis": "", "evidence": ["a"], "confidence": 0.5})),
            Err(SchemaViolation::MissingHypothesis)
        );
        assert_eq!(
            validate(&json!({"hypothesis": "h", "evidence": [], "confidence": 0.5})),
            Err(SchemaViolation::InvalidEvidence)
        );
        assert_eq!(
            validate(&json!({"hypothesis": "h", "evidence": ["a", 2], "confidence": 0.5})),
            Err(SchemaViolation::InvalidEvidence)
        );
        assert_eq!(
            validate(&json!({"hypothesis": "h", "evidence": ["a"], "confidence": 1.2})),
            Err(SchemaViolation::ConfidenceOutOfRange)
        );
        assert_eq!(
            validate(&json!({"hypothesis": "h", "evidence": ["a"], "confidence": "high"})),
            Err(SchemaViolation::ConfidenceOutOfRange)
        );
    }

    #[test]
    fn test_whitespace_hypothesis_is_non_empty() {
        let insights = validate(&json!({
            "hypothesis": "   ",
            "evidence": ["a"],
            "confidence": 0.5
        }))
        .unwrap();

        assert_eq!(insights.hypothesis, "   ");
    }

    #[test]
    fn test_malformed_attempt() {
        let attempt = DiagnosticAttempt::evaluate(1, "not json".to_string());

        assert!(attempt.parsed.is_none());
        assert!(matches!(attempt.verdict, Err(SchemaViolation::Malformed(_))));
        assert_eq!(attempt.previous_response(), Value::String("not json".to_string()));
    }

    #[test]
    fn test_first_prompt_has_no_feedback() {
        let prompt = DiagnosticLoop::build_prompt(&[], &UserProfile::new(), &EvidenceContext::default(), None);
        let value: Value = serde_json::from_str(&prompt).unwrap();

        assert!(value.get("feedback").is_none());
        assert!(value["system_rules"].as_str().unwrap().contains("diagnostics specialist"));
    }
}
