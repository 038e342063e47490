//! Detection sources.
//!
//! Pose estimation itself lives outside this crate. [`ReplayDetector`]
//! reads detections that were extracted earlier; [`CommandDetector`] asks an
//! external extractor to produce them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;

use super::process::run_command;
use super::{DetectionLimits, Detector};
use crate::domain::Detection;

/// Suffix of the sidecar file next to a clip
pub const SIDECAR_SUFFIX: &str = ".detections.json";

/// Reads detection JSON from disk.
///
/// A media path ending in `.json` is read directly; anything else is
/// resolved to its `<media>.detections.json` sidecar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayDetector;

impl ReplayDetector {
    pub fn source_path(media_path: &Path) -> PathBuf {
        if media_path.extension().is_some_and(|ext| ext == "json") {
            return media_path.to_path_buf();
        }
        let mut name = media_path.as_os_str().to_os_string();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }
}

#[async_trait]
impl Detector for ReplayDetector {
    async fn detect(&self, media_path: &Path, limits: DetectionLimits) -> Result<Vec<Detection>> {
        let source = Self::source_path(media_path);
        let content = fs::read_to_string(&source)
            .await
            .with_context(|| format!("Failed to read detections: {}", source.display()))?;

        let detections: Vec<Detection> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse detections: {}", source.display()))?;

        Ok(apply_limits(detections, limits))
    }
}

/// Keep every `frame_stride`-th record, at most `max_frames` of them
pub fn apply_limits(detections: Vec<Detection>, limits: DetectionLimits) -> Vec<Detection> {
    detections
        .into_iter()
        .step_by(limits.frame_stride.max(1))
        .take(limits.max_frames)
        .collect()
}

/// Runs `<argv..> <media> --max-frames N --frame-stride S` and parses
/// stdout as a detection array.
pub struct CommandDetector {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandDetector {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }
}

#[async_trait]
impl Detector for CommandDetector {
    async fn detect(&self, media_path: &Path, limits: DetectionLimits) -> Result<Vec<Detection>> {
        if !media_path.exists() {
            anyhow::bail!("Media path does not exist: {}", media_path.display());
        }

        let mut argv = self.argv.clone();
        argv.push(media_path.to_string_lossy().into_owned());
        argv.extend([
            "--max-frames".to_string(),
            limits.max_frames.to_string(),
            "--frame-stride".to_string(),
            limits.frame_stride.to_string(),
        ]);

        let stdout = run_command(&argv, "", self.timeout).await?;
        let detections: Vec<Detection> = serde_json::from_str(super::strip_code_fence(&stdout))
            .context("Detector output is not a detection array")?;

        // Extractors already sample; only the frame cap is enforced here
        Ok(detections.into_iter().take(limits.max_frames).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn detections(n: usize) -> Vec<Detection> {
        (0..n)
            .map(|i| Detection {
                frame_index: i,
                timestamp: i as f64 / 30.0,
                racket_angle: Some(60.0),
                keypoints: Default::default(),
            })
            .collect()
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            ReplayDetector::source_path(Path::new("/clips/serve.mp4")),
            PathBuf::from("/clips/serve.mp4.detections.json")
        );
        assert_eq!(
            ReplayDetector::source_path(Path::new("/clips/serve.json")),
            PathBuf::from("/clips/serve.json")
        );
    }

    #[test]
    fn test_apply_limits() {
        let limits = DetectionLimits {
            max_frames: 3,
            frame_stride: 2,
        };
        let kept: Vec<usize> = apply_limits(detections(10), limits)
            .iter()
            .map(|d| d.frame_index)
            .collect();

        assert_eq!(kept, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_replay_reads_sidecar() {
        let temp = TempDir::new().unwrap();
        let media = temp.path().join("rally.mp4");
        std::fs::write(
            temp.path().join("rally.mp4.detections.json"),
            serde_json::to_string(&detections(5)).unwrap(),
        )
        .unwrap();

        let limits = DetectionLimits {
            max_frames: 10,
            frame_stride: 1,
        };
        let loaded = ReplayDetector.detect(&media, limits).await.unwrap();
        assert_eq!(loaded.len(), 5);
    }

    #[tokio::test]
    async fn test_replay_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = ReplayDetector
            .detect(&temp.path().join("none.mp4"), DetectionLimits::default())
            .await;
        assert!(result.is_err());
    }
}
