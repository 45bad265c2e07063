//! Per-scene composition: one self-contained clip with background, text
//! overlay, optional avatar overlay and an audio track. Scenes are composed
//! on a fixed canvas; normalization to the output profile happens at final
//! encode.

use std::path::Path;

use crate::{
    error::ScenecastResult,
    media::ffmpeg::{color_literal, escape_filter_text},
    model::{Background, SceneSpec},
};

/// Canvas every scene clip is composed on.
pub const COMPOSE_WIDTH: u32 = 1280;
pub const COMPOSE_HEIGHT: u32 = 720;

/// Avatar picture-in-picture width and margin, in canvas pixels.
const AVATAR_WIDTH: u32 = 384;
const AVATAR_MARGIN: u32 = 24;

/// Everything the composer needs for one scene. Any of the optional media
/// may be absent; the clip is still valid (silent scene, avatar-less scene).
pub struct ComposeInput<'a> {
    pub scene: &'a SceneSpec,
    /// Resolved background asset, when `Background::Asset` was requested.
    pub background: Option<&'a Path>,
    pub narration: Option<&'a Path>,
    pub avatar: Option<&'a Path>,
    pub duration_secs: f64,
    pub fps: u32,
    pub out: &'a Path,
}

/// Build the full ffmpeg argument list for one scene clip.
pub fn build_compose_args(input: &ComposeInput<'_>) -> ScenecastResult<Vec<String>> {
    let dur = format!("{:.3}", input.duration_secs);
    let mut args: Vec<String> = Vec::new();

    // Input 0: background.
    match (&input.scene.visual.background, input.background) {
        (Background::Asset { .. }, Some(path)) => {
            args.extend(["-loop", "1", "-t"].map(str::to_string));
            args.push(dur.clone());
            args.push("-i".to_string());
            args.push(path.display().to_string());
        }
        (bg, _) => {
            let color = match bg {
                Background::Solid { color } => color_literal(color)?,
                // Unresolved asset backgrounds fall back to the default
                // solid; the composer never fails here, asset resolution
                // errors are raised before compose is called.
                Background::Asset { .. } => "0x121420".to_string(),
            };
            args.extend(["-f", "lavfi", "-t"].map(str::to_string));
            args.push(dur.clone());
            args.push("-i".to_string());
            args.push(format!(
                "color=c={color}:s={COMPOSE_WIDTH}x{COMPOSE_HEIGHT}:r={}",
                input.fps
            ));
        }
    }

    // Input 1: audio, narration or silence. Every clip carries an audio
    // stream so concatenation sees a uniform layout.
    match input.narration {
        Some(path) => {
            args.push("-i".to_string());
            args.push(path.display().to_string());
        }
        None => {
            args.extend(["-f", "lavfi", "-t"].map(str::to_string));
            args.push(dur.clone());
            args.push("-i".to_string());
            args.push("anullsrc=r=44100:cl=stereo".to_string());
        }
    }

    // Input 2: avatar clip.
    if let Some(path) = input.avatar {
        args.push("-i".to_string());
        args.push(path.display().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(build_compose_filter(input)?);

    args.extend(["-map", "[vout]", "-map", "1:a", "-t"].map(str::to_string));
    args.push(dur.clone());
    args.push("-r".to_string());
    args.push(input.fps.to_string());
    args.extend(
        [
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-crf",
            "18",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-movflags",
            "+faststart",
        ]
        .map(str::to_string),
    );
    args.push(input.out.display().to_string());

    Ok(args)
}

fn build_compose_filter(input: &ComposeInput<'_>) -> ScenecastResult<String> {
    let mut chains: Vec<String> = Vec::new();

    let bg_chain = match (&input.scene.visual.background, input.background) {
        (Background::Asset { .. }, Some(_)) => format!(
            "[0:v]scale={COMPOSE_WIDTH}:{COMPOSE_HEIGHT}:force_original_aspect_ratio=increase,\
             crop={COMPOSE_WIDTH}:{COMPOSE_HEIGHT},setsar=1[bg]"
        ),
        _ => "[0:v]setsar=1[bg]".to_string(),
    };
    chains.push(bg_chain);

    let text = input.scene.text.trim();
    if text.is_empty() {
        chains.push("[bg]null[v0]".to_string());
    } else {
        let style = &input.scene.visual.text_style;
        chains.push(format!(
            "[bg]drawtext=text='{}':fontcolor={}:fontsize={}:\
             x=(w-text_w)/2:y=h-text_h-{AVATAR_MARGIN}:\
             box=1:boxcolor=0x00000080:boxborderw=12[v0]",
            escape_filter_text(text),
            color_literal(&style.color)?,
            style.font_size,
        ));
    }

    if input.avatar.is_some() {
        chains.push(format!("[2:v]scale={AVATAR_WIDTH}:-2[pip]"));
        chains.push(format!(
            "[v0][pip]overlay=x=W-w-{AVATAR_MARGIN}:y=H-h-{AVATAR_MARGIN}[vout]"
        ));
    } else {
        chains.push("[v0]null[vout]".to_string());
    }

    Ok(chains.join(";"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TextStyle, Transition, VisualSpec};
    use std::path::PathBuf;

    fn scene(text: &str, background: Background) -> SceneSpec {
        SceneSpec {
            id: "s1".to_string(),
            text: text.to_string(),
            duration_hint_secs: None,
            narration: None,
            avatar: None,
            visual: VisualSpec {
                background,
                text_style: TextStyle::default(),
            },
            transition_to_next: Transition::None,
        }
    }

    #[test]
    fn silent_solid_scene_uses_lavfi_sources() {
        let scene = scene("hello", Background::default());
        let out = PathBuf::from("scene.mp4");
        let args = build_compose_args(&ComposeInput {
            scene: &scene,
            background: None,
            narration: None,
            avatar: None,
            duration_secs: 3.0,
            fps: 30,
            out: &out,
        })
        .unwrap();

        let joined = args.join(" ");
        assert!(joined.contains("color=c=0x121420:s=1280x720:r=30"));
        assert!(joined.contains("anullsrc"));
        assert!(joined.contains("drawtext"));
        assert!(!joined.contains("overlay"));
        assert!(joined.contains("-t 3.000"));
    }

    #[test]
    fn asset_background_is_covered_and_cropped() {
        let scene = scene(
            "hi",
            Background::Asset {
                asset_id: "bg.png".to_string(),
            },
        );
        let bg = PathBuf::from("/assets/bg.png");
        let out = PathBuf::from("scene.mp4");
        let args = build_compose_args(&ComposeInput {
            scene: &scene,
            background: Some(&bg),
            narration: None,
            avatar: None,
            duration_secs: 4.0,
            fps: 30,
            out: &out,
        })
        .unwrap();

        let joined = args.join(" ");
        assert!(joined.contains("/assets/bg.png"));
        assert!(joined.contains("force_original_aspect_ratio=increase"));
        assert!(joined.contains("crop=1280:720"));
    }

    #[test]
    fn avatar_is_overlaid_bottom_right_with_narration_audio() {
        let mut s = scene("talk", Background::default());
        s.avatar = Some(crate::model::AvatarSpec {
            style: "presenter".to_string(),
        });
        let narration = PathBuf::from("n.wav");
        let avatar = PathBuf::from("a.mp4");
        let out = PathBuf::from("scene.mp4");
        let args = build_compose_args(&ComposeInput {
            scene: &s,
            background: None,
            narration: Some(&narration),
            avatar: Some(&avatar),
            duration_secs: 5.0,
            fps: 30,
            out: &out,
        })
        .unwrap();

        let joined = args.join(" ");
        assert!(joined.contains("overlay=x=W-w-24:y=H-h-24"));
        assert!(joined.contains("[2:v]scale=384:-2"));
        assert!(!joined.contains("anullsrc"));
    }

    #[test]
    fn empty_text_skips_drawtext() {
        let scene = scene("   ", Background::default());
        let out = PathBuf::from("scene.mp4");
        let args = build_compose_args(&ComposeInput {
            scene: &scene,
            background: None,
            narration: None,
            avatar: None,
            duration_secs: 3.0,
            fps: 24,
            out: &out,
        })
        .unwrap();
        assert!(!args.join(" ").contains("drawtext"));
    }
}
