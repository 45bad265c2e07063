//! Final encode: normalize the merged timeline to the output profile and
//! optionally mix a global music bed under the narration.

use std::path::Path;

use crate::{error::ScenecastResult, profile::EncoderParams};

/// Volume applied to the background-audio track so it sits under narration.
const MUSIC_VOLUME: f64 = 0.25;

pub fn build_encode_args(
    timeline: &Path,
    params: &EncoderParams,
    background_audio: Option<&Path>,
    out: &Path,
) -> ScenecastResult<Vec<String>> {
    let mut args: Vec<String> = Vec::new();

    args.push("-i".to_string());
    args.push(timeline.display().to_string());

    if let Some(music) = background_audio {
        // Loop the bed; amix with duration=first ends it with the timeline.
        args.extend(["-stream_loop", "-1", "-i"].map(str::to_string));
        args.push(music.display().to_string());
    }

    let mut filter = format!(
        "[0:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}[v]",
        w = params.width,
        h = params.height,
        fps = params.fps,
    );
    if background_audio.is_some() {
        filter.push_str(&format!(
            ";[1:a]volume={MUSIC_VOLUME}[bed];\
             [0:a][bed]amix=inputs=2:duration=first:dropout_transition=2[a]"
        ));
    } else {
        filter.push_str(";[0:a]anull[a]");
    }

    args.push("-filter_complex".to_string());
    args.push(filter);

    args.extend(["-map", "[v]", "-map", "[a]"].map(str::to_string));
    args.extend(["-c:v", "libx264", "-preset"].map(str::to_string));
    args.push(params.preset.to_string());
    args.push("-crf".to_string());
    args.push(params.crf.to_string());
    args.push("-maxrate".to_string());
    args.push(format!("{}k", params.max_bitrate_kbps));
    args.push("-bufsize".to_string());
    args.push(format!("{}k", params.max_bitrate_kbps * 2));
    args.push("-pix_fmt".to_string());
    args.push(params.pix_fmt.to_string());
    args.extend(
        ["-c:a", "aac", "-b:a", "192k", "-movflags", "+faststart"].map(str::to_string),
    );
    args.push(out.display().to_string());

    Ok(args)
}
