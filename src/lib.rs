#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod job;
pub mod media;
pub mod model;
pub mod orchestrator;
pub mod profile;
pub mod providers;
pub mod server;
pub mod timeline;
pub mod workspace;

pub use config::PipelineConfig;
pub use error::{ScenecastError, ScenecastResult};
pub use job::{JobSnapshot, JobState, RenderJob, SceneState};
pub use media::{FfmpegBackend, MediaBackend};
pub use model::{OutputProfile, Quality, RenderRequest, Resolution, SceneSpec, Transition};
pub use orchestrator::Orchestrator;
pub use timeline::{SceneClip, TimelinePlan, plan_timeline};
pub use workspace::JobWorkspace;
