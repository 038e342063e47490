//! Harness Integration Tests
//!
//! Runs a small manifest end to end through the orchestrator with fake
//! stages and checks the per-sample and macro metrics.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use strokelab::adapters::evaluator::ISSUE_ANGLE_UNDETECTED;
use strokelab::core::{Orchestrator, SessionStore};
use strokelab::harness::{run_manifest, ManifestSample};
use strokelab::domain::UserProfile;
use tempfile::TempDir;

use common::fake_stages;

#[tokio::test]
async fn test_manifest_scores_each_sample_in_fresh_session() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::open(temp.path().join("sessions.json")).await.unwrap());
    let (stages, counters) = fake_stages(20);
    let orchestrator = Orchestrator::new(store.clone(), temp.path().join("cache"), stages);

    let samples = vec![
        ManifestSample {
            video: PathBuf::from("forehand.mp4"),
            expected_issues: vec![ISSUE_ANGLE_UNDETECTED.to_string()],
            user_profile: None,
        },
        ManifestSample {
            video: PathBuf::from("backhand.mp4"),
            expected_issues: vec![ISSUE_ANGLE_UNDETECTED.to_string(), "Late contact".to_string()],
            user_profile: Some(UserProfile::new().with("level", "Advanced")),
        },
    ];

    let report = run_manifest(&orchestrator, &samples).await.unwrap();

    assert_eq!(counters.calls(), [2, 2, 2, 2]);
    assert_eq!(report.samples.len(), 2);
    assert_ne!(report.samples[0].session_id, report.samples[1].session_id);

    assert_eq!(report.samples[0].precision, 1.0);
    assert_eq!(report.samples[0].recall, 1.0);
    assert_eq!(report.samples[1].recall, 0.5);
    assert_eq!(report.macro_precision, 1.0);
    assert_eq!(report.macro_recall, 0.75);
    assert!(report.samples.iter().all(|s| s.latency_sec.is_some()));
    // Two shots of ten frames each, both flagged
    assert_eq!(report.samples[0].predicted_issues.len(), 2);

    let first = store.get(&report.samples[0].session_id).await.unwrap();
    assert_eq!(first.user_profile.get_str("level"), Some("Intermediate"));
    let second = store.get(&report.samples[1].session_id).await.unwrap();
    assert_eq!(second.user_profile.get_str("level"), Some("Advanced"));
}
