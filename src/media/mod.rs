//! Media execution layer. The orchestrator talks to a [`MediaBackend`]
//! trait object; the shipping implementation drives the system ffmpeg
//! binaries, tests substitute their own.

pub mod compose;
pub mod concat;
pub mod encode;
pub mod ffmpeg;

use std::path::Path;

use async_trait::async_trait;

use crate::{
    error::{ScenecastError, ScenecastResult},
    profile::EncoderParams,
    timeline::{SceneClip, TimelinePlan},
};
pub use compose::{COMPOSE_HEIGHT, COMPOSE_WIDTH, ComposeInput};

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Media duration in seconds, used to resolve scene lengths from
    /// synthesized narration and avatar files.
    async fn probe_duration(&self, path: &Path) -> ScenecastResult<f64>;

    /// Render one scene into a self-contained clip at `input.out`.
    async fn compose_scene(&self, input: ComposeInput<'_>) -> ScenecastResult<SceneClip>;

    /// Merge the clips per `plan` into a single timeline file.
    async fn concatenate(
        &self,
        clips: &[SceneClip],
        plan: &TimelinePlan,
        fps: u32,
        out: &Path,
    ) -> ScenecastResult<()>;

    /// Write the final artifact at the profile's resolution and rate.
    async fn encode(
        &self,
        timeline: &Path,
        params: &EncoderParams,
        background_audio: Option<&Path>,
        out: &Path,
    ) -> ScenecastResult<()>;
}

/// Backend shelling out to `ffmpeg`/`ffprobe`.
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> ScenecastResult<Self> {
        if !ffmpeg::is_ffmpeg_on_path() {
            return Err(ScenecastError::encode(
                "ffmpeg is required but was not found on PATH",
            ));
        }
        Ok(Self)
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn probe_duration(&self, path: &Path) -> ScenecastResult<f64> {
        ffmpeg::probe_duration_secs(path).await
    }

    async fn compose_scene(&self, input: ComposeInput<'_>) -> ScenecastResult<SceneClip> {
        let scene_id = input.scene.id.clone();
        let args = compose::build_compose_args(&input)?;
        ffmpeg::ensure_parent_dir(input.out)?;
        ffmpeg::run_ffmpeg(&args)
            .await
            .map_err(|e| ScenecastError::compose(&scene_id, e.to_string()))?;

        let duration_secs = ffmpeg::probe_duration_secs(input.out)
            .await
            .map_err(|e| ScenecastError::compose(&scene_id, e.to_string()))?;

        Ok(SceneClip {
            scene_id,
            path: input.out.to_path_buf(),
            duration_secs,
            width: COMPOSE_WIDTH,
            height: COMPOSE_HEIGHT,
        })
    }

    async fn concatenate(
        &self,
        clips: &[SceneClip],
        plan: &TimelinePlan,
        fps: u32,
        out: &Path,
    ) -> ScenecastResult<()> {
        // Clips are merged at the compose canvas size; the profile's
        // resolution is applied at final encode.
        let args =
            concat::build_concat_args(clips, plan, COMPOSE_WIDTH, COMPOSE_HEIGHT, fps, out)?;
        ffmpeg::run_ffmpeg(&args).await
    }

    async fn encode(
        &self,
        timeline: &Path,
        params: &EncoderParams,
        background_audio: Option<&Path>,
        out: &Path,
    ) -> ScenecastResult<()> {
        let args = encode::build_encode_args(timeline, params, background_audio, out)?;
        ffmpeg::ensure_parent_dir(out)?;
        ffmpeg::run_ffmpeg(&args).await?;

        // COMPLETED is only ever declared over a real file.
        let meta = std::fs::metadata(out).map_err(|e| {
            ScenecastError::encode(format!("encoder produced no output file: {e}"))
        })?;
        if meta.len() == 0 {
            return Err(ScenecastError::encode("encoder produced an empty file"));
        }
        Ok(())
    }
}
