use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;

use crate::error::ScenecastResult;

/// Tunables for the rendering pipeline. Every value has a default; a JSON
/// file can override any subset of them.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root under which each job gets its own working directory.
    pub workspace_root: PathBuf,
    /// Root directory for caller-supplied assets (backgrounds, images).
    pub asset_root: PathBuf,
    /// Where finished artifacts are moved once a job completes.
    pub artifact_root: PathBuf,
    /// How many jobs may render at the same time.
    pub max_concurrent_jobs: usize,
    /// Bounded parallelism for scene synthesis within one job.
    pub scene_parallelism: usize,
    /// Submission is rejected above this scene count.
    pub max_scenes: usize,
    /// Submission is rejected when any scene's text exceeds this many bytes.
    pub max_scene_text_len: usize,
    /// Attempts per provider call (first try included).
    pub retry_attempts: u32,
    /// Base delay for exponential backoff, milliseconds.
    pub retry_base_delay_ms: u64,
    /// Hard timeout for a single synthesis or encode call, seconds.
    pub call_timeout_secs: u64,
    /// Overlap window for fade/slide/zoom transitions, seconds.
    pub transition_overlap_secs: f64,
    /// Terminal jobs and their artifacts are collected after this long.
    pub retention_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("work"),
            asset_root: PathBuf::from("assets"),
            artifact_root: PathBuf::from("artifacts"),
            max_concurrent_jobs: 2,
            scene_parallelism: 2,
            max_scenes: 50,
            max_scene_text_len: 2_000,
            retry_attempts: 3,
            retry_base_delay_ms: 1_000,
            call_timeout_secs: 90,
            transition_overlap_secs: 0.4,
            retention_secs: 3_600,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &std::path::Path) -> ScenecastResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw).with_context(|| "parse config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ScenecastResult<()> {
        use crate::error::ScenecastError;
        if self.max_concurrent_jobs == 0 {
            return Err(ScenecastError::validation("max_concurrent_jobs must be > 0"));
        }
        if self.scene_parallelism == 0 {
            return Err(ScenecastError::validation("scene_parallelism must be > 0"));
        }
        if self.max_scenes == 0 {
            return Err(ScenecastError::validation("max_scenes must be > 0"));
        }
        if self.retry_attempts == 0 {
            return Err(ScenecastError::validation("retry_attempts must be > 0"));
        }
        if !self.transition_overlap_secs.is_finite() || self.transition_overlap_secs <= 0.0 {
            return Err(ScenecastError::validation(
                "transition_overlap_secs must be a positive number",
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
