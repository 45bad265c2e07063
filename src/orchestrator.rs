//! The coordinating state machine: accepts render requests, drives each
//! scene through narration → avatar → compose, merges the clips, encodes the
//! artifact, and tracks job state for polling clients.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::StreamExt as _;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::PipelineConfig,
    error::{ScenecastError, ScenecastResult},
    job::{JobSnapshot, JobState, RenderJob, SceneState},
    media::{ComposeInput, MediaBackend},
    model::{Background, RenderRequest, SceneSpec},
    profile::encoder_params,
    providers::{AssetResolver, AvatarClient, NarrationChain, RetryPolicy},
    timeline::{SceneClip, plan_timeline},
    workspace::JobWorkspace,
};

/// Share of overall progress spent on per-scene work; the remaining 20% is
/// reserved for concatenation and encode, which operate on the whole
/// timeline.
const SCENE_PROGRESS_SHARE: u64 = 80;
const CONCAT_PROGRESS: u8 = 90;

struct JobEntry {
    job: RenderJob,
    cancel: CancellationToken,
    terminal_at: Option<DateTime<Utc>>,
}

pub struct Orchestrator {
    config: PipelineConfig,
    registry: RwLock<HashMap<Uuid, JobEntry>>,
    narration: NarrationChain,
    avatar: AvatarClient,
    assets: Arc<dyn AssetResolver>,
    backend: Arc<dyn MediaBackend>,
    job_slots: Arc<Semaphore>,
}

/// A scene that failed, tagged with its request index so concurrent failures
/// resolve deterministically (lowest index wins).
struct SceneFailure {
    index: usize,
    stage: &'static str,
    error: ScenecastError,
}

enum SceneOutcome {
    Done(SceneClip),
    Skipped,
    Failed(SceneFailure),
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        narration: NarrationChain,
        avatar: AvatarClient,
        assets: Arc<dyn AssetResolver>,
        backend: Arc<dyn MediaBackend>,
    ) -> ScenecastResult<Arc<Self>> {
        config.validate()?;
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Ok(Arc::new(Self {
            config,
            registry: RwLock::new(HashMap::new()),
            narration,
            avatar,
            assets,
            backend,
            job_slots,
        }))
    }

    pub fn retry_policy(config: &PipelineConfig) -> RetryPolicy {
        RetryPolicy {
            attempts: config.retry_attempts,
            base_delay: config.retry_base_delay(),
            call_timeout: config.call_timeout(),
        }
    }

    /// Validate and accept a render request. Returns immediately with the
    /// new job id; rendering happens on a background task.
    pub async fn submit(self: &Arc<Self>, request: RenderRequest) -> ScenecastResult<Uuid> {
        request.validate(self.config.max_scenes, self.config.max_scene_text_len)?;

        let id = Uuid::new_v4();
        let job = RenderJob::new(id, request);
        let cancel = CancellationToken::new();
        self.registry.write().await.insert(
            id,
            JobEntry {
                job,
                cancel: cancel.clone(),
                terminal_at: None,
            },
        );
        tracing::info!(job_id = %id, "render job accepted");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_job(id, cancel).await;
        });

        Ok(id)
    }

    /// Consistent point-in-time copy of the job's state.
    pub async fn get_status(&self, id: Uuid) -> ScenecastResult<JobSnapshot> {
        let registry = self.registry.read().await;
        let entry = registry
            .get(&id)
            .ok_or_else(|| ScenecastError::not_found(format!("job {id}")))?;
        Ok(entry.job.snapshot())
    }

    /// Cooperative cancellation. True when the job was still pending or
    /// running and the request was accepted; false once terminal.
    pub async fn cancel(&self, id: Uuid) -> ScenecastResult<bool> {
        let registry = self.registry.read().await;
        let entry = registry
            .get(&id)
            .ok_or_else(|| ScenecastError::not_found(format!("job {id}")))?;
        if entry.job.state.is_terminal() {
            return Ok(false);
        }
        entry.cancel.cancel();
        tracing::info!(job_id = %id, "cancellation requested");
        Ok(true)
    }

    /// Path of the finished artifact. `NotReady` until COMPLETED, `NotFound`
    /// for unknown jobs or artifacts collected by retention.
    pub async fn get_artifact(&self, id: Uuid) -> ScenecastResult<PathBuf> {
        let registry = self.registry.read().await;
        let entry = registry
            .get(&id)
            .ok_or_else(|| ScenecastError::not_found(format!("job {id}")))?;
        if entry.job.state != JobState::Completed {
            return Err(ScenecastError::not_ready(format!(
                "job {id} is {:?}",
                entry.job.state
            )));
        }
        let path = entry
            .job
            .artifact_path
            .clone()
            .ok_or_else(|| ScenecastError::not_found(format!("artifact for job {id}")))?;
        if !path.is_file() {
            return Err(ScenecastError::not_found(format!("artifact for job {id}")));
        }
        Ok(path)
    }

    /// Drop terminal jobs older than the retention window, artifacts
    /// included. Returns how many were collected.
    pub async fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.retention())
                .unwrap_or_else(|_| chrono::Duration::hours(1));
        let mut registry = self.registry.write().await;
        let expired: Vec<Uuid> = registry
            .iter()
            .filter(|(_, e)| e.terminal_at.is_some_and(|t| t < cutoff))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(entry) = registry.remove(id) {
                if let Some(artifact) = entry.job.artifact_path {
                    if let Err(e) = std::fs::remove_file(&artifact) {
                        if artifact.exists() {
                            tracing::warn!(job_id = %id, error = %e, "artifact removal failed");
                        }
                    }
                }
                tracing::info!(job_id = %id, "job collected by retention sweep");
            }
        }
        expired.len()
    }

    /// Tick period for the retention sweeper. A zero retention window is a
    /// valid config (collect as soon as possible); `tokio::time::interval`
    /// panics on a zero period, so the floor is one second.
    fn sweep_period(config: &PipelineConfig) -> Duration {
        Duration::from_secs(60)
            .min(config.retention())
            .max(Duration::from_secs(1))
    }

    /// Periodic retention sweeping until the token is cancelled.
    pub fn spawn_retention_sweeper(self: &Arc<Self>, shutdown: CancellationToken) {
        let this = Arc::clone(self);
        let period = Self::sweep_period(&this.config);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let n = this.sweep_expired().await;
                        if n > 0 {
                            tracing::debug!(collected = n, "retention sweep");
                        }
                    }
                }
            }
        });
    }

    async fn with_job<R>(&self, id: Uuid, f: impl FnOnce(&mut RenderJob) -> R) -> Option<R> {
        let mut registry = self.registry.write().await;
        let entry = registry.get_mut(&id)?;
        let out = f(&mut entry.job);
        if entry.job.state.is_terminal() && entry.terminal_at.is_none() {
            entry.terminal_at = Some(Utc::now());
        }
        Some(out)
    }

    async fn run_job(self: Arc<Self>, id: Uuid, cancel: CancellationToken) {
        // The job stays PENDING while waiting for a slot.
        let permit = match Arc::clone(&self.job_slots).acquire_owned().await {
            Ok(p) => p,
            Err(_) => return,
        };

        if cancel.is_cancelled() {
            self.with_job(id, |job| job.cancel()).await;
            return;
        }

        let request = match self.with_job(id, |job| {
            job.start();
            job.request.clone()
        })
        .await
        {
            Some(r) => r,
            None => return,
        };

        match self.render(id, &request, &cancel).await {
            Ok(artifact) => {
                self.with_job(id, |job| job.complete(artifact)).await;
                tracing::info!(job_id = %id, "render job completed");
            }
            Err(RenderAbort::Cancelled) => {
                self.with_job(id, |job| job.cancel()).await;
                tracing::info!(job_id = %id, "render job cancelled");
            }
            Err(RenderAbort::Failed { stage, error }) => {
                tracing::error!(job_id = %id, stage, error = %error, "render job failed");
                self.with_job(id, |job| job.fail(stage, &error)).await;
            }
        }

        drop(permit);
    }

    async fn render(
        &self,
        id: Uuid,
        request: &RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, RenderAbort> {
        let workspace = JobWorkspace::create(&self.config.workspace_root, id)
            .map_err(|e| RenderAbort::fatal("workspace", e))?;

        let clips = self.render_scenes(id, request, &workspace, cancel).await?;

        if cancel.is_cancelled() {
            return Err(RenderAbort::Cancelled);
        }

        let transitions: Vec<_> = request
            .scenes
            .iter()
            .take(request.scenes.len() - 1)
            .map(|s| s.transition_to_next)
            .collect();
        let plan = plan_timeline(&clips, &transitions, self.config.transition_overlap_secs)
            .map_err(|e| RenderAbort::fatal("concat", e))?;

        self.with_job(id, |job| {
            job.set_progress(
                (SCENE_PROGRESS_SHARE as u8).max(job.progress_percent),
                format!("concatenating {} scenes", clips.len()),
            )
        })
        .await;

        let timeline = workspace.timeline_path();
        self.backend
            .concatenate(&clips, &plan, request.profile.fps, &timeline)
            .await
            .map_err(|e| RenderAbort::fatal("concat", e))?;

        if cancel.is_cancelled() {
            return Err(RenderAbort::Cancelled);
        }

        self.with_job(id, |job| job.set_progress(CONCAT_PROGRESS, "encoding"))
            .await;

        let params = encoder_params(&request.profile);
        let background_audio = match &request.background_audio {
            Some(asset_id) => Some(
                self.assets
                    .resolve(asset_id)
                    .map_err(|e| RenderAbort::fatal("encode", e))?,
            ),
            None => None,
        };
        let encoded = workspace.encode_output_path(request.profile.container.extension());
        self.backend
            .encode(&timeline, &params, background_audio.as_deref(), &encoded)
            .await
            .map_err(|e| RenderAbort::fatal("encode", e))?;

        let artifact = self.config.artifact_root.join(format!(
            "{id}.{}",
            request.profile.container.extension()
        ));
        workspace
            .promote_artifact(&encoded, &artifact)
            .map_err(|e| RenderAbort::fatal("encode", e))?;

        Ok(artifact)
        // workspace drops here; every intermediate is purged.
    }

    /// Per-scene synthesis and composition with bounded parallelism. Concat
    /// is a strict barrier: this returns only once every launched scene has
    /// finished. On failure or cancellation no new scenes start, in-flight
    /// ones drain, and the lowest failing index wins.
    async fn render_scenes(
        &self,
        id: Uuid,
        request: &RenderRequest,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<Vec<SceneClip>, RenderAbort> {
        let total = request.scenes.len();
        let fps = request.profile.fps;
        let abort = tokio::sync::watch::channel(false).0;

        // Futures are built eagerly; an iterator adapter borrowing the scene
        // list does not satisfy the spawn's Send bound.
        let scene_futures: Vec<_> = request
            .scenes
            .iter()
            .enumerate()
            .map(|(index, scene)| {
                let abort = abort.subscribe();
                async move {
                    // Scene boundary: the only place cancellation and
                    // failure stop-launch are observed.
                    if *abort.borrow() || cancel.is_cancelled() {
                        return (index, SceneOutcome::Skipped);
                    }
                    let outcome = match self
                        .process_scene(id, index, total, scene, fps, workspace)
                        .await
                    {
                        Ok(clip) => SceneOutcome::Done(clip),
                        Err(failure) => SceneOutcome::Failed(failure),
                    };
                    (index, outcome)
                }
            })
            .collect();

        let outcomes: Vec<(usize, SceneOutcome)> = futures::stream::iter(scene_futures)
            .buffer_unordered(self.config.scene_parallelism)
            .inspect(|(_, outcome)| {
                if matches!(outcome, SceneOutcome::Failed(_)) {
                    let _ = abort.send(true);
                }
            })
            .collect()
            .await;

        let mut clips: Vec<Option<SceneClip>> = (0..total).map(|_| None).collect();
        let mut first_failure: Option<SceneFailure> = None;
        let mut skipped = false;
        for (index, outcome) in outcomes {
            match outcome {
                SceneOutcome::Done(clip) => clips[index] = Some(clip),
                SceneOutcome::Skipped => skipped = true,
                SceneOutcome::Failed(failure) => {
                    let replace = first_failure
                        .as_ref()
                        .is_none_or(|f| failure.index < f.index);
                    if replace {
                        first_failure = Some(failure);
                    }
                }
            }
        }

        if let Some(failure) = first_failure {
            return Err(RenderAbort::Failed {
                stage: failure.stage,
                error: failure.error,
            });
        }
        if cancel.is_cancelled() || skipped {
            return Err(RenderAbort::Cancelled);
        }

        // All scenes completed; clips come back in request order regardless
        // of which finished first.
        Ok(clips
            .into_iter()
            .map(|c| c.expect("every scene produced a clip"))
            .collect())
    }

    async fn process_scene(
        &self,
        id: Uuid,
        index: usize,
        total: usize,
        scene: &SceneSpec,
        fps: u32,
        workspace: &JobWorkspace,
    ) -> Result<SceneClip, SceneFailure> {
        self.with_job(id, |job| {
            job.set_scene_state(&scene.id, SceneState::Synthesizing);
            job.set_progress(
                job.progress_percent,
                format!("synthesizing scene {}/{total}", index + 1),
            );
        })
        .await;

        match self.synthesize_scene(index, scene, fps, workspace).await {
            Ok(clip) => {
                self.with_job(id, |job| {
                    job.set_scene_state(&scene.id, SceneState::Composed);
                    let composed = job
                        .scenes
                        .iter()
                        .filter(|s| s.state == SceneState::Composed)
                        .count() as u64;
                    let percent = (composed * SCENE_PROGRESS_SHARE / total as u64) as u8;
                    job.set_progress(percent, format!("scene {}/{total} composed", index + 1));
                })
                .await;
                Ok(clip)
            }
            Err(failure) => {
                self.with_job(id, |job| job.set_scene_state(&scene.id, SceneState::Failed))
                    .await;
                Err(failure)
            }
        }
    }

    async fn synthesize_scene(
        &self,
        index: usize,
        scene: &SceneSpec,
        fps: u32,
        workspace: &JobWorkspace,
    ) -> Result<SceneClip, SceneFailure> {
        let fail = |stage: &'static str| {
            move |error: ScenecastError| SceneFailure {
                index,
                stage,
                error,
            }
        };

        // Narration.
        let mut narration_path = None;
        let mut narration_secs = None;
        if let Some(spec) = &scene.narration {
            let out = workspace.narration_path(&scene.id);
            self.narration
                .synthesize(&scene.text, spec, &out)
                .await
                .map_err(fail("narration"))?;
            let secs = self
                .backend
                .probe_duration(&out)
                .await
                .map_err(fail("narration"))?;
            narration_path = Some(out);
            narration_secs = Some(secs);
        }

        // Avatar, consuming the narration audio.
        let mut avatar_path = None;
        let mut avatar_secs = None;
        if let Some(spec) = &scene.avatar {
            let narration = narration_path
                .as_deref()
                .expect("validation guarantees narration for avatar scenes");
            let out = workspace.avatar_path(&scene.id);
            self.avatar
                .synthesize(&scene.text, narration, &spec.style, &out)
                .await
                .map_err(fail("avatar"))?;
            let secs = self
                .backend
                .probe_duration(&out)
                .await
                .map_err(fail("avatar"))?;
            avatar_path = Some(out);
            avatar_secs = Some(secs);
        }

        // Background asset, if the scene references one.
        let background = match &scene.visual.background {
            Background::Asset { asset_id } => Some(
                self.assets
                    .resolve(asset_id)
                    .map_err(|e| match e {
                        ScenecastError::AssetMissing { asset, .. } => ScenecastError::AssetMissing {
                            asset,
                            scene_id: Some(scene.id.clone()),
                        },
                        other => other,
                    })
                    .map_err(fail("compose"))?,
            ),
            Background::Solid { .. } => None,
        };

        let duration_secs = scene.resolve_duration(narration_secs, avatar_secs);
        let clip = self
            .backend
            .compose_scene(ComposeInput {
                scene,
                background: background.as_deref(),
                narration: narration_path.as_deref(),
                avatar: avatar_path.as_deref(),
                duration_secs,
                fps,
                out: &workspace.scene_clip_path(&scene.id),
            })
            .await
            .map_err(fail("compose"))?;

        Ok(clip)
    }
}

enum RenderAbort {
    Cancelled,
    Failed {
        stage: &'static str,
        error: ScenecastError,
    },
}

impl RenderAbort {
    fn fatal(stage: &'static str, error: ScenecastError) -> Self {
        RenderAbort::Failed { stage, error }
    }
}
