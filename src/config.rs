//! Configuration for strokelab.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (STROKELAB_HOME, STROKELAB_SESSION_STORE,
//!    STROKELAB_CACHE_ROOT, STROKELAB_REPORTS, STROKELAB_GENERATOR)
//! 2. Config file (.strokelab/config.yaml)
//! 3. Defaults (~/.strokelab)
//!
//! Config file discovery:
//! - Searches current directory and parents for .strokelab/config.yaml
//! - Paths in config file are relative to the project root (the directory
//!   holding `.strokelab/`)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::generator::default_command;
use crate::adapters::DetectionLimits;

pub const CONFIG_DIR: &str = ".strokelab";
pub const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
    #[serde(default)]
    pub detector: Option<DetectorConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    pub session_store: Option<String>,
    pub cache_root: Option<String>,
    pub reports: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub command: Option<Vec<String>>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    pub command: Option<Vec<String>>,
    pub timeout_seconds: Option<u64>,
    pub max_frames: Option<usize>,
    pub frame_stride: Option<usize>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to strokelab home (engine state)
    pub home: PathBuf,
    /// Session store document
    pub session_store: PathBuf,
    /// Root of the per-session stage cache
    pub cache_root: PathBuf,
    /// Where evaluation reports are written
    pub reports_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub generator: GeneratorSettings,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Program and arguments; the prompt is written to stdin
    pub command: Vec<String>,
    pub timeout_seconds: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// External extractor; detections are replayed from disk when unset
    pub command: Option<Vec<String>>,
    pub timeout_seconds: u64,
    pub max_frames: usize,
    pub frame_stride: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        let limits = DetectionLimits::default();
        Self {
            command: None,
            timeout_seconds: 300,
            max_frames: limits.max_frames,
            frame_stride: limits.frame_stride,
        }
    }
}

impl ResolvedConfig {
    /// Defaults rooted at `home`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            session_store: home.join("sessions.json"),
            cache_root: home.join("cache"),
            reports_dir: home.join("reports"),
            home,
            config_file: None,
            generator: GeneratorSettings::default(),
            detector: DetectorSettings::default(),
        }
    }

    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let default_home = dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(CONFIG_DIR);

        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        let file = match find_config_file(&cwd) {
            Some(path) => {
                let parsed = load_config_file(&path)?;
                Some((path, parsed))
            }
            None => None,
        };

        resolve(default_home, file, |key| std::env::var(key).ok())
    }

    pub fn limits(&self) -> DetectionLimits {
        DetectionLimits {
            max_frames: self.detector.max_frames,
            frame_stride: self.detector.frame_stride.max(1),
        }
    }
}

/// Find config file by searching `start` and its parents
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Merge env, file and defaults. `env` is injected so tests stay hermetic.
fn resolve(
    default_home: PathBuf,
    file: Option<(PathBuf, ConfigFile)>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let (config_file, parsed) = match file {
        Some((path, parsed)) => (Some(path), Some(parsed)),
        None => (None, None),
    };

    // Project root is the parent of .strokelab/
    let base_dir = config_file
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let paths = parsed.as_ref().map(|c| c.paths.clone()).unwrap_or_default();
    let from_file = |value: &Option<String>| value.as_deref().map(|p| resolve_path(&base_dir, p));

    let home = env("STROKELAB_HOME")
        .map(PathBuf::from)
        .or_else(|| from_file(&paths.home))
        .unwrap_or(default_home);

    let mut config = ResolvedConfig::with_home(&home);
    config.config_file = config_file;

    if let Some(path) = env("STROKELAB_SESSION_STORE").map(PathBuf::from).or_else(|| from_file(&paths.session_store)) {
        config.session_store = path;
    }
    if let Some(path) = env("STROKELAB_CACHE_ROOT").map(PathBuf::from).or_else(|| from_file(&paths.cache_root)) {
        config.cache_root = path;
    }
    if let Some(path) = env("STROKELAB_REPORTS").map(PathBuf::from).or_else(|| from_file(&paths.reports)) {
        config.reports_dir = path;
    }

    if let Some(generator) = parsed.as_ref().and_then(|c| c.generator.as_ref()) {
        if let Some(command) = &generator.command {
            config.generator.command = command.clone();
        }
        if let Some(timeout) = generator.timeout_seconds {
            config.generator.timeout_seconds = timeout;
        }
    }
    if let Some(raw) = env("STROKELAB_GENERATOR") {
        config.generator.command = serde_json::from_str(&raw)
            .context("STROKELAB_GENERATOR must be a JSON array of strings")?;
    }
    if config.generator.command.is_empty() {
        anyhow::bail!("Generator command must not be empty");
    }

    if let Some(detector) = parsed.as_ref().and_then(|c| c.detector.as_ref()) {
        config.detector.command = detector.command.clone().filter(|argv| !argv.is_empty());
        if let Some(timeout) = detector.timeout_seconds {
            config.detector.timeout_seconds = timeout;
        }
        if let Some(max_frames) = detector.max_frames {
            config.detector.max_frames = max_frames;
        }
        if let Some(stride) = detector.frame_stride {
            config.detector.frame_stride = stride;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(PathBuf::from("/home/u/.strokelab"), None, no_env).unwrap();

        assert_eq!(config.session_store, PathBuf::from("/home/u/.strokelab/sessions.json"));
        assert_eq!(config.cache_root, PathBuf::from("/home/u/.strokelab/cache"));
        assert_eq!(config.generator.command, vec!["claude", "--print"]);
        assert!(config.detector.command.is_none());
        assert_eq!(config.limits().max_frames, 200);
        assert_eq!(config.limits().frame_stride, 3);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing_and_resolution() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: state
  reports: /var/reports
generator:
  command: ["llm", "-m", "local"]
detector:
  command: ["pose-extract"]
  frame_stride: 5
"#
        )
        .unwrap();

        let nested = temp.path().join("clips").join("today");
        std::fs::create_dir_all(&nested).unwrap();
        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, config_path);

        let parsed = load_config_file(&found).unwrap();
        let config = resolve(PathBuf::from("/unused"), Some((found, parsed)), no_env).unwrap();

        assert_eq!(config.home, temp.path().join("state"));
        assert_eq!(config.session_store, temp.path().join("state").join("sessions.json"));
        assert_eq!(config.reports_dir, PathBuf::from("/var/reports"));
        assert_eq!(config.generator.command, vec!["llm", "-m", "local"]);
        assert_eq!(config.generator.timeout_seconds, 120);
        assert_eq!(config.detector.command, Some(vec!["pose-extract".to_string()]));
        assert_eq!(config.limits().frame_stride, 5);
        assert_eq!(config.limits().max_frames, 200);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("STROKELAB_HOME", "/env/home"),
            ("STROKELAB_CACHE_ROOT", "/env/cache"),
            ("STROKELAB_GENERATOR", r#"["ollama", "run", "llama3"]"#),
        ]
        .into_iter()
        .collect();

        let config = resolve(PathBuf::from("/default"), None, |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.home, PathBuf::from("/env/home"));
        assert_eq!(config.session_store, PathBuf::from("/env/home/sessions.json"));
        assert_eq!(config.cache_root, PathBuf::from("/env/cache"));
        assert_eq!(config.generator.command, vec!["ollama", "run", "llama3"]);
    }

    #[test]
    fn test_invalid_generator_env() {
        let result = resolve(PathBuf::from("/default"), None, |key| {
            (key == "STROKELAB_GENERATOR").then(|| "claude --print".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_stride_is_clamped() {
        let mut config = ResolvedConfig::with_home("/tmp/x");
        config.detector.frame_stride = 0;
        assert_eq!(config.limits().frame_stride, 1);
    }
}
