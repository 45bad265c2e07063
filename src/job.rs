use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{error::ScenecastError, model::RenderRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneState {
    Waiting,
    Synthesizing,
    Composed,
    Failed,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SceneStatus {
    pub scene_id: String,
    pub state: SceneState,
}

/// Error record surfaced to clients, verbatim: which stage, which scene (if
/// scene-scoped), and the underlying message.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct JobError {
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    pub message: String,
}

impl JobError {
    pub fn from_error(stage: &str, err: &ScenecastError) -> Self {
        Self {
            stage: stage.to_string(),
            scene_id: err.scene_id().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// The mutable aggregate for one render. Only the owning worker writes to
/// it; everyone else reads snapshot clones out of the registry.
#[derive(Clone, Debug)]
pub struct RenderJob {
    pub id: Uuid,
    pub request: RenderRequest,
    pub state: JobState,
    pub progress_percent: u8,
    pub current_stage: String,
    pub scenes: Vec<SceneStatus>,
    pub artifact_path: Option<PathBuf>,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RenderJob {
    pub fn new(id: Uuid, request: RenderRequest) -> Self {
        let scenes = request
            .scenes
            .iter()
            .map(|s| SceneStatus {
                scene_id: s.id.clone(),
                state: SceneState::Waiting,
            })
            .collect();
        let now = Utc::now();
        Self {
            id,
            request,
            state: JobState::Pending,
            progress_percent: 0,
            current_stage: "queued".to_string(),
            scenes,
            artifact_path: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Progress never decreases, and never moves once terminal.
    pub fn set_progress(&mut self, percent: u8, stage: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        self.progress_percent = self.progress_percent.max(percent.min(100));
        self.current_stage = stage.into();
        self.updated_at = Utc::now();
    }

    pub fn set_scene_state(&mut self, scene_id: &str, state: SceneState) {
        if let Some(s) = self.scenes.iter_mut().find(|s| s.scene_id == scene_id) {
            s.state = state;
        }
        self.updated_at = Utc::now();
    }

    pub fn start(&mut self) {
        debug_assert_eq!(self.state, JobState::Pending);
        self.state = JobState::Running;
        self.current_stage = "starting".to_string();
        self.updated_at = Utc::now();
    }

    /// Terminal transitions happen at most once; later ones are dropped.
    pub fn complete(&mut self, artifact: PathBuf) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Completed;
        self.progress_percent = 100;
        self.current_stage = "completed".to_string();
        self.artifact_path = Some(artifact);
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, stage: &str, err: &ScenecastError) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Failed;
        self.current_stage = format!("failed during {stage}");
        self.error = Some(JobError::from_error(stage, err));
        self.updated_at = Utc::now();
    }

    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = JobState::Cancelled;
        self.current_stage = "cancelled".to_string();
        self.updated_at = Utc::now();
    }

    /// Point-in-time view served by the status endpoint.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            state: self.state,
            progress_percent: self.progress_percent,
            current_stage: self.current_stage.clone(),
            scenes: self.scenes.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            estimated_completion: self.estimate_completion(),
        }
    }

    /// Linear extrapolation from elapsed time and progress. A hint, nothing
    /// more; `None` until there is signal to extrapolate from.
    fn estimate_completion(&self) -> Option<DateTime<Utc>> {
        if self.state != JobState::Running || self.progress_percent == 0 {
            return None;
        }
        let elapsed = (Utc::now() - self.created_at).num_milliseconds().max(0);
        let total = elapsed * 100 / i64::from(self.progress_percent);
        Some(self.created_at + chrono::Duration::milliseconds(total))
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub state: JobState,
    pub progress_percent: u8,
    pub current_stage: String,
    pub scenes: Vec<SceneStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
}
