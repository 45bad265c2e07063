use std::path::{Path, PathBuf};

use anyhow::Context as _;
use uuid::Uuid;

use crate::error::{ScenecastError, ScenecastResult};

/// Per-job working directory. Holds every intermediate file a job produces
/// (narration audio, avatar clips, scene clips, the merged timeline) and
/// removes all of it when dropped, on every exit path.
///
/// The one file allowed to outlive the workspace is the final artifact,
/// which `promote_artifact` moves out before the purge.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: PathBuf,
}

impl JobWorkspace {
    /// Directory name is the job id, which keeps concurrent jobs
    /// collision-free and makes stray directories attributable.
    pub fn create(root: &Path, job_id: Uuid) -> ScenecastResult<Self> {
        let dir = root.join(job_id.to_string());
        if dir.exists() {
            return Err(ScenecastError::validation(format!(
                "workspace '{}' already exists",
                dir.display()
            )));
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create workspace '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn narration_path(&self, scene_id: &str) -> PathBuf {
        self.dir.join(format!("narration-{scene_id}.wav"))
    }

    pub fn avatar_path(&self, scene_id: &str) -> PathBuf {
        self.dir.join(format!("avatar-{scene_id}.mp4"))
    }

    pub fn scene_clip_path(&self, scene_id: &str) -> PathBuf {
        self.dir.join(format!("scene-{scene_id}.mp4"))
    }

    pub fn timeline_path(&self) -> PathBuf {
        self.dir.join("timeline.mp4")
    }

    pub fn encode_output_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("output.{extension}"))
    }

    /// Move the finished file out of the workspace so the purge cannot touch
    /// it. A rename, not a copy: there is never a moment with two live
    /// copies of the artifact.
    pub fn promote_artifact(&self, from: &Path, dest: &Path) -> ScenecastResult<()> {
        if !from.starts_with(&self.dir) {
            return Err(ScenecastError::validation(format!(
                "'{}' is not inside this workspace",
                from.display()
            )));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create artifact directory '{}'", parent.display()))?;
        }
        std::fs::rename(from, dest).with_context(|| {
            format!("move artifact '{}' -> '{}'", from.display(), dest.display())
        })?;
        Ok(())
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if self.dir.exists() {
                tracing::warn!(dir = %self.dir.display(), error = %e, "workspace purge failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_drop_removes_everything() {
        let root = tempfile::tempdir().unwrap();
        let job_id = Uuid::new_v4();
        let dir;
        {
            let ws = JobWorkspace::create(root.path(), job_id).unwrap();
            dir = ws.dir().to_path_buf();
            std::fs::write(ws.narration_path("s1"), b"pcm").unwrap();
            std::fs::write(ws.scene_clip_path("s1"), b"h264").unwrap();
            assert!(dir.exists());
        }
        assert!(!dir.exists());
    }

    #[test]
    fn promoted_artifact_survives_the_purge() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("artifacts").join("final.mp4");
        {
            let ws = JobWorkspace::create(root.path(), Uuid::new_v4()).unwrap();
            let out = ws.encode_output_path("mp4");
            std::fs::write(&out, b"video").unwrap();
            ws.promote_artifact(&out, &dest).unwrap();
            assert!(!out.exists());
        }
        assert!(dest.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"video");
    }

    #[test]
    fn promote_rejects_paths_outside_the_workspace() {
        let root = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::create(root.path(), Uuid::new_v4()).unwrap();
        let foreign = root.path().join("elsewhere.mp4");
        std::fs::write(&foreign, b"x").unwrap();
        assert!(
            ws.promote_artifact(&foreign, &root.path().join("final.mp4"))
                .is_err()
        );
    }

    #[test]
    fn duplicate_workspace_for_same_job_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let job_id = Uuid::new_v4();
        let _ws = JobWorkspace::create(root.path(), job_id).unwrap();
        assert!(JobWorkspace::create(root.path(), job_id).is_err());
    }
}
