//! Main orchestrator for the analysis pipeline.
//!
//! Runs detect → evaluate → diagnose → coach strictly in order. Each stage
//! output is cached per session; with `resume` set, a cached stage is loaded
//! instead of re-run. Every freshly completed stage appends a session event,
//! so partial progress survives a failure and a later resumed run skips it.
//!
//! A cached entry is trusted even if the stage inputs changed since it was
//! written. For the detect stage a mismatch in media path is logged.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::adapters::{
    Coach, CommandDetector, CommandGenerator, DetectionLimits, Detector, Evaluator, Generator,
    LlmCoach, ReplayDetector, RuleBasedEvaluator,
};
use crate::config::ResolvedConfig;
use crate::domain::events::stage_complete;
use crate::domain::{
    CoachingPlan, Detection, Diagnosis, Evaluation, Report, SessionRecord, Stage, StageFailure,
    PIPELINE_COMPLETE,
};
use crate::tools::ToolRegistry;

use super::diagnosis::DiagnosticLoop;
use super::session_store::SessionStore;
use super::stage_cache::StageCache;
use super::telemetry::TimedSpan;

/// The external collaborators behind each stage
#[derive(Clone)]
pub struct StageSet {
    pub detector: Arc<dyn Detector>,
    pub evaluator: Arc<dyn Evaluator>,
    /// Used by the diagnose stage
    pub generator: Arc<dyn Generator>,
    pub coach: Arc<dyn Coach>,
}

impl StageSet {
    /// Wire up the command-backed adapters described by `config`
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let generator: Arc<dyn Generator> = Arc::new(CommandGenerator::new(
            config.generator.command.clone(),
            Duration::from_secs(config.generator.timeout_seconds),
        ));

        let detector: Arc<dyn Detector> = match &config.detector.command {
            Some(argv) if !argv.is_empty() => Arc::new(CommandDetector::new(
                argv.clone(),
                Duration::from_secs(config.detector.timeout_seconds),
            )),
            _ => Arc::new(ReplayDetector),
        };

        Self {
            detector,
            evaluator: Arc::new(RuleBasedEvaluator),
            coach: Arc::new(LlmCoach::new(generator.clone())),
            generator,
        }
    }
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    store: Arc<SessionStore>,
    cache: StageCache,
    tools: ToolRegistry,
    stages: StageSet,
    limits: DetectionLimits,
}

impl Orchestrator {
    pub fn new(store: Arc<SessionStore>, cache_root: impl Into<PathBuf>, stages: StageSet) -> Self {
        Self {
            store,
            cache: StageCache::new(cache_root),
            tools: ToolRegistry::new(),
            stages,
            limits: DetectionLimits::default(),
        }
    }

    /// Override the detection bounds
    pub fn with_limits(mut self, limits: DetectionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn cache(&self) -> &StageCache {
        &self.cache
    }

    /// Analyze `media_path` within `session`.
    ///
    /// Stage errors propagate with a [`StageFailure`] context naming the
    /// stage. Outputs of stages that finished before the failure stay cached.
    #[instrument(skip(self, media_path, session), fields(session_id = %session.session_id))]
    pub async fn run(&self, media_path: &Path, session: &SessionRecord, resume: bool) -> Result<Report> {
        let session_id = session.session_id.as_str();
        let profile = &session.user_profile;

        // Log run start
        info!(event = "pipeline_start", resume, media = %media_path.display(), "Starting pipeline");

        if resume {
            self.warn_on_media_change(session_id, media_path).await;
        }

        // Stage 1: detections from media
        let detections: Vec<Detection> = self
            .load_or_execute(
                session_id,
                Stage::Detect,
                resume,
                json!({ "media_path": media_path.display().to_string() }),
                self.stages.detector.detect(media_path, self.limits),
            )
            .await?;

        // Stage 2: score shots
        let evaluations: Vec<Evaluation> = self
            .load_or_execute(
                session_id,
                Stage::Evaluate,
                resume,
                json!({ "detections": detections.len() }),
                self.stages.evaluator.evaluate(&detections),
            )
            .await?;

        // Evidence context is rebuilt every run, never cached
        let evidence = self
            .tools
            .gather_context(&evaluations, profile)
            .context("Failed to gather evidence context")?;

        // Stage 3: schema-checked diagnosis
        let diagnosis: Diagnosis = self
            .load_or_execute(
                session_id,
                Stage::Diagnose,
                resume,
                json!({ "evaluations": evaluations.len() }),
                async {
                    DiagnosticLoop::new(self.stages.generator.as_ref())
                        .run(&evaluations, profile, &evidence)
                        .await
                        .map_err(anyhow::Error::from)
                },
            )
            .await?;

        if diagnosis.retry_budget_exceeded {
            warn!(
                attempts = diagnosis.attempts,
                "Diagnosis exhausted its retry budget, continuing with last attempt"
            );
        }

        // Stage 4: coaching plan
        let plan: CoachingPlan = self
            .load_or_execute(
                session_id,
                Stage::Coach,
                resume,
                json!({
                    "evaluations": evaluations.len(),
                    "diagnosis_validated": !diagnosis.retry_budget_exceeded,
                }),
                self.stages
                    .coach
                    .coach(&evaluations, profile, &evidence, Some(&diagnosis)),
            )
            .await?;

        // Assemble report; the hint reflects events before this run completes
        let report = Report {
            session_id: session_id.to_string(),
            detections_count: detections.len(),
            resume_hint: self.store.resume_hint(session_id).await,
            evaluations,
            diagnosis,
            plan,
        };

        let issues: Vec<&[String]> = report.evaluations.iter().map(|e| e.issues.as_slice()).collect();
        self.store
            .append_event(
                session_id,
                PIPELINE_COMPLETE,
                json!({ "frames": report.detections_count, "issues": issues }),
            )
            .await?;

        // Store as the session's last result
        let result = serde_json::to_value(&report).context("Failed to serialize report")?;
        self.store.set_last_result(session_id, result).await?;

        info!(event = "pipeline_end", "Pipeline complete");
        Ok(report)
    }

    /// Return the cached output for `stage` when resuming, otherwise await
    /// `work`, cache its output, and record a `<stage>_complete` event.
    ///
    /// `work` is only polled on a cache miss.
    async fn load_or_execute<T, Fut>(
        &self,
        session_id: &str,
        stage: Stage,
        resume: bool,
        summary: Value,
        work: Fut,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<T>>,
    {
        if resume {
            match self.cache.load::<T>(session_id, stage).await {
                Ok(Some(data)) => {
                    info!(
                        event = "stage_resume",
                        %stage,
                        cache = %self.cache.entry_path(session_id, stage).display(),
                        "Using cached stage output"
                    );
                    return Ok(data);
                }
                Ok(None) => {}
                Err(e) => {
                    let error = format!("{:#}", e);
                    warn!(%stage, %error, "Cached output unreadable, re-running stage");
                }
            }
        }

        // Execute inside a timed span
        let data = {
            let _span = TimedSpan::enter(stage.as_str(), session_id, summary.clone());
            work.await.context(StageFailure { stage })?
        };

        // Persist output, then record the event
        let cache_path = self.cache.store(session_id, stage, &data).await?;
        self.store
            .append_event(
                session_id,
                &stage_complete(stage),
                json!({
                    "cache": cache_path.display().to_string(),
                    "summary": summary,
                }),
            )
            .await?;

        info!(event = "stage_complete", %stage, "Stage complete");
        Ok(data)
    }

    /// Cached detections are reused as-is; flag when they came from other media
    async fn warn_on_media_change(&self, session_id: &str, media_path: &Path) {
        if !self.cache.contains(session_id, Stage::Detect) {
            return;
        }
        let Some(record) = self.store.get(session_id).await else {
            return;
        };

        let recorded = record
            .last_event_of_type(&stage_complete(Stage::Detect))
            .and_then(|e| e.payload.pointer("/summary/media_path"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let current = media_path.display().to_string();
        if let Some(recorded) = recorded {
            if recorded != current {
                warn!(
                    %recorded,
                    %current,
                    "Resuming with cached detections produced from different media"
                );
            }
        }
    }
}
