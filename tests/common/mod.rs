//! Shared fixtures: a scripted narration provider and a stub media backend
//! that records calls instead of spawning ffmpeg. Synthesized "media" files
//! hold their duration in seconds as plain text so probing stays honest.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use scenecast::{
    PipelineConfig,
    error::{ScenecastError, ScenecastResult},
    job::JobSnapshot,
    media::{ComposeInput, MediaBackend},
    model::{
        Container, NarrationSpec, OutputProfile, Quality, RenderRequest, Resolution, SceneSpec,
        Transition, VisualSpec,
    },
    orchestrator::Orchestrator,
    profile::EncoderParams,
    providers::{AssetResolver, AvatarClient, AvatarSynthesizer, NarrationChain, NarrationSynthesizer},
    timeline::{SceneClip, TimelinePlan},
};
use uuid::Uuid;

pub struct ScriptedNarrator {
    pub duration_secs: f64,
    pub fail_first: u32,
    pub delay: Duration,
    pub calls: AtomicU32,
}

impl ScriptedNarrator {
    pub fn ok(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            fail_first: 0,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn flaky(duration_secs: f64, fail_first: u32) -> Self {
        Self {
            fail_first,
            ..Self::ok(duration_secs)
        }
    }

    pub fn slow(duration_secs: f64, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok(duration_secs)
        }
    }
}

#[async_trait]
impl NarrationSynthesizer for ScriptedNarrator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn synthesize(
        &self,
        _text: &str,
        _spec: &NarrationSpec,
        out: &Path,
    ) -> ScenecastResult<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            return Err(ScenecastError::provider_transient("scripted outage"));
        }
        std::fs::write(out, format!("{}", self.duration_secs)).map_err(anyhow::Error::from)?;
        Ok(())
    }
}

pub struct ScriptedAvatar {
    pub duration_secs: f64,
}

#[async_trait]
impl AvatarSynthesizer for ScriptedAvatar {
    fn name(&self) -> &str {
        "scripted-avatar"
    }

    async fn synthesize(
        &self,
        _text: &str,
        narration: &Path,
        _style: &str,
        out: &Path,
    ) -> ScenecastResult<()> {
        assert!(narration.is_file(), "avatar runs after narration");
        std::fs::write(out, format!("{}", self.duration_secs)).map_err(anyhow::Error::from)?;
        Ok(())
    }
}

/// Resolves any asset id that was registered up front.
pub struct MapAssetResolver {
    files: HashMap<String, PathBuf>,
}

impl MapAssetResolver {
    pub fn empty() -> Self {
        Self {
            files: HashMap::new(),
        }
    }

    pub fn with(root: &Path, ids: &[&str]) -> Self {
        let mut files = HashMap::new();
        for id in ids {
            let path = root.join(id);
            std::fs::write(&path, b"asset").unwrap();
            files.insert((*id).to_string(), path);
        }
        Self { files }
    }
}

impl AssetResolver for MapAssetResolver {
    fn resolve(&self, asset_id: &str) -> ScenecastResult<PathBuf> {
        self.files
            .get(asset_id)
            .cloned()
            .ok_or_else(|| ScenecastError::asset_missing(asset_id, None))
    }
}

#[derive(Default)]
pub struct StubBackend {
    /// Extra latency per scene id, to force out-of-order completion.
    pub compose_delay: HashMap<String, Duration>,
    /// Scene ids whose composition fails after any configured delay.
    pub fail_compose: std::collections::HashSet<String>,
    pub fail_encode: bool,
    /// Scene ids in the order concatenate received them.
    pub concat_order: Mutex<Vec<String>>,
    /// Total planned duration seen at concatenate time.
    pub planned_total: Mutex<Option<f64>>,
}

fn read_duration(path: &Path) -> ScenecastResult<f64> {
    let raw = std::fs::read_to_string(path).map_err(anyhow::Error::from)?;
    raw.trim()
        .parse()
        .map_err(|_| ScenecastError::encode(format!("unparsable stub media '{raw}'")))
}

#[async_trait]
impl MediaBackend for StubBackend {
    async fn probe_duration(&self, path: &Path) -> ScenecastResult<f64> {
        read_duration(path)
    }

    async fn compose_scene(&self, input: ComposeInput<'_>) -> ScenecastResult<SceneClip> {
        if let Some(delay) = self.compose_delay.get(&input.scene.id) {
            tokio::time::sleep(*delay).await;
        }
        if self.fail_compose.contains(&input.scene.id) {
            return Err(ScenecastError::compose(&input.scene.id, "stub layout overflow"));
        }
        std::fs::write(input.out, format!("{}", input.duration_secs))
            .map_err(anyhow::Error::from)?;
        Ok(SceneClip {
            scene_id: input.scene.id.clone(),
            path: input.out.to_path_buf(),
            duration_secs: input.duration_secs,
            width: 1280,
            height: 720,
        })
    }

    async fn concatenate(
        &self,
        clips: &[SceneClip],
        plan: &TimelinePlan,
        _fps: u32,
        out: &Path,
    ) -> ScenecastResult<()> {
        *self.concat_order.lock().unwrap() =
            clips.iter().map(|c| c.scene_id.clone()).collect();
        *self.planned_total.lock().unwrap() = Some(plan.total_duration_secs);
        std::fs::write(out, format!("{:.3}", plan.total_duration_secs))
            .map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn encode(
        &self,
        timeline: &Path,
        _params: &EncoderParams,
        _background_audio: Option<&Path>,
        out: &Path,
    ) -> ScenecastResult<()> {
        if self.fail_encode {
            return Err(ScenecastError::encode("stub encoder unavailable"));
        }
        let total = std::fs::read_to_string(timeline).map_err(anyhow::Error::from)?;
        std::fs::write(out, format!("encoded:{}", total.trim())).map_err(anyhow::Error::from)?;
        Ok(())
    }
}

pub fn test_config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        workspace_root: root.join("work"),
        asset_root: root.join("assets"),
        artifact_root: root.join("artifacts"),
        max_concurrent_jobs: 2,
        scene_parallelism: 2,
        max_scenes: 50,
        max_scene_text_len: 2_000,
        retry_attempts: 3,
        retry_base_delay_ms: 1,
        call_timeout_secs: 5,
        transition_overlap_secs: 0.4,
        retention_secs: 3_600,
    }
}

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub backend: Arc<StubBackend>,
}

pub fn harness(
    config: PipelineConfig,
    narrators: Vec<Arc<dyn NarrationSynthesizer>>,
    avatar: Option<Arc<dyn AvatarSynthesizer>>,
    assets: MapAssetResolver,
    backend: StubBackend,
) -> Harness {
    let policy = Orchestrator::retry_policy(&config);
    let backend = Arc::new(backend);
    let orchestrator = Orchestrator::new(
        config,
        NarrationChain::new(narrators, policy),
        AvatarClient::new(avatar, policy),
        Arc::new(assets),
        backend.clone(),
    )
    .unwrap();
    Harness {
        orchestrator,
        backend,
    }
}

pub fn narrated_scene(id: &str, transition: Transition) -> SceneSpec {
    SceneSpec {
        id: id.to_string(),
        text: format!("scene {id}"),
        duration_hint_secs: None,
        narration: Some(NarrationSpec {
            voice: "test-voice".to_string(),
            language: "en".to_string(),
        }),
        avatar: None,
        visual: VisualSpec::default(),
        transition_to_next: transition,
    }
}

pub fn silent_scene(id: &str, duration_hint: f64) -> SceneSpec {
    SceneSpec {
        id: id.to_string(),
        text: String::new(),
        duration_hint_secs: Some(duration_hint),
        narration: None,
        avatar: None,
        visual: VisualSpec::default(),
        transition_to_next: Transition::None,
    }
}

pub fn request(scenes: Vec<SceneSpec>) -> RenderRequest {
    RenderRequest {
        scenes,
        profile: OutputProfile {
            resolution: Resolution::R720p,
            quality: Quality::Medium,
            fps: 30,
            container: Container::Mp4,
        },
        background_audio: None,
    }
}

/// Poll until the job is terminal, recording every observed progress value.
pub async fn wait_terminal(orchestrator: &Orchestrator, id: Uuid) -> (JobSnapshot, Vec<u8>) {
    let mut observed = Vec::new();
    for _ in 0..2_000 {
        let snapshot = orchestrator.get_status(id).await.unwrap();
        observed.push(snapshot.progress_percent);
        if snapshot.state.is_terminal() {
            return (snapshot, observed);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} never reached a terminal state");
}
