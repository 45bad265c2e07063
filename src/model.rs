use crate::error::{ScenecastError, ScenecastResult};

/// Hard floor for a scene with no narration, no avatar and no explicit hint.
pub const MIN_SCENE_DURATION_SECS: f64 = 3.0;

/// Immutable description of one render: an ordered scene list plus global
/// output settings. Snapshotted into the job at submission; never mutated.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderRequest {
    pub scenes: Vec<SceneSpec>,
    pub profile: OutputProfile,
    /// Optional global music track, mixed under any per-scene narration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_audio: Option<String>,
}

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct OutputProfile {
    pub resolution: Resolution,
    pub quality: Quality,
    pub fps: u32,
    #[serde(default)]
    pub container: Container,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    R720p,
    #[serde(rename = "1080p")]
    R1080p,
    #[serde(rename = "4k")]
    R4k,
}

impl Resolution {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::R720p => (1280, 720),
            Resolution::R1080p => (1920, 1080),
            Resolution::R4k => (3840, 2160),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
    Ultra,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    #[default]
    Mp4,
}

impl Container {
    pub fn extension(self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
        }
    }
}

/// One segment of the final video.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SceneSpec {
    /// Caller-supplied id, unique within the request. Progress is keyed by it.
    pub id: String,
    pub text: String,
    /// Explicit length in seconds. Ignored when narration or an avatar clip
    /// determines the duration (see [`SceneSpec::resolve_duration`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_hint_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<NarrationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<AvatarSpec>,
    #[serde(default)]
    pub visual: VisualSpec,
    /// Transition bridging this scene into the next; the last scene's value
    /// is ignored.
    #[serde(default)]
    pub transition_to_next: Transition,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct NarrationSpec {
    pub voice: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AvatarSpec {
    pub style: String,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct VisualSpec {
    #[serde(default)]
    pub background: Background,
    #[serde(default)]
    pub text_style: TextStyle,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Background {
    /// Flat color frame, `#rrggbb`.
    Solid { color: String },
    /// Caller-supplied image or video asset, resolved through the asset store.
    Asset { asset_id: String },
}

impl Default for Background {
    fn default() -> Self {
        Background::Solid {
            color: "#121420".to_string(),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextStyle {
    pub font_size: u32,
    pub color: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        TextStyle {
            font_size: 48,
            color: "#ffffff".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Hard cut: no trimming, no overlap.
    #[default]
    None,
    Fade,
    Slide,
    Zoom,
}

impl Transition {
    /// Seconds trimmed off the shared boundary of two adjacent clips.
    /// `None` contributes zero; every other kind uses the configured window.
    pub fn overlap_secs(self, window: f64) -> f64 {
        match self {
            Transition::None => 0.0,
            Transition::Fade | Transition::Slide | Transition::Zoom => window,
        }
    }
}

impl RenderRequest {
    pub fn validate(&self, max_scenes: usize, max_text_len: usize) -> ScenecastResult<()> {
        if self.scenes.is_empty() {
            return Err(ScenecastError::validation("scene list must be non-empty"));
        }
        if self.scenes.len() > max_scenes {
            return Err(ScenecastError::validation(format!(
                "request has {} scenes, maximum is {max_scenes}",
                self.scenes.len()
            )));
        }
        if self.profile.fps == 0 || self.profile.fps > 120 {
            return Err(ScenecastError::validation("fps must be in 1..=120"));
        }

        let mut seen = std::collections::HashSet::new();
        for scene in &self.scenes {
            if scene.id.trim().is_empty() {
                return Err(ScenecastError::validation("scene id must be non-empty"));
            }
            if !seen.insert(scene.id.as_str()) {
                return Err(ScenecastError::validation(format!(
                    "duplicate scene id '{}'",
                    scene.id
                )));
            }
            if scene.text.len() > max_text_len {
                return Err(ScenecastError::validation(format!(
                    "scene '{}' text exceeds {max_text_len} bytes",
                    scene.id
                )));
            }
            if let Some(hint) = scene.duration_hint_secs {
                if !hint.is_finite() || hint <= 0.0 {
                    return Err(ScenecastError::validation(format!(
                        "scene '{}' duration hint must be a positive number",
                        scene.id
                    )));
                }
            }
            if scene.avatar.is_some() && scene.narration.is_none() {
                // Avatar synthesis consumes the narration audio track.
                return Err(ScenecastError::validation(format!(
                    "scene '{}' requests an avatar without narration",
                    scene.id
                )));
            }
        }

        Ok(())
    }
}

impl SceneSpec {
    /// Duration once narration/avatar lengths are known. Precedence:
    /// avatar clip > narration audio > explicit hint > fixed minimum.
    pub fn resolve_duration(&self, narration_secs: Option<f64>, avatar_secs: Option<f64>) -> f64 {
        avatar_secs
            .or(narration_secs)
            .or(self.duration_hint_secs)
            .unwrap_or(MIN_SCENE_DURATION_SECS)
            .max(0.1)
    }
}
