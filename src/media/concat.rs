//! Realizes a [`TimelinePlan`] as one ffmpeg invocation.
//!
//! Boundaries with a transition are merged with `xfade`/`acrossfade`, which
//! overlap the neighbouring clips and therefore shorten the output by the
//! overlap window. Hard cuts split the clip list into runs; runs are joined
//! with the `concat` filter, which preserves duration exactly.

use std::path::Path;

use crate::{
    error::{ScenecastError, ScenecastResult},
    model::Transition,
    timeline::{SceneClip, TimelinePlan},
};

fn xfade_name(transition: Transition) -> Option<&'static str> {
    match transition {
        Transition::None => None,
        Transition::Fade => Some("fade"),
        Transition::Slide => Some("slideleft"),
        Transition::Zoom => Some("zoomin"),
    }
}

/// Build the ffmpeg argument list merging `clips` per `plan` into `out`,
/// normalized to `width`x`height` at `fps`.
pub fn build_concat_args(
    clips: &[SceneClip],
    plan: &TimelinePlan,
    width: u32,
    height: u32,
    fps: u32,
    out: &Path,
) -> ScenecastResult<Vec<String>> {
    if clips.len() != plan.placements.len() {
        return Err(ScenecastError::validation(
            "clip list does not match the timeline plan",
        ));
    }

    let mut args: Vec<String> = Vec::new();
    for clip in clips {
        args.push("-i".to_string());
        args.push(clip.path.display().to_string());
    }

    args.push("-filter_complex".to_string());
    args.push(build_concat_filter(clips, plan, width, height, fps));

    args.extend(["-map", "[outv]", "-map", "[outa]"].map(str::to_string));
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
            "192k",
            "-movflags",
            "+faststart",
        ]
        .map(str::to_string),
    );
    args.push(out.display().to_string());
    Ok(args)
}

fn build_concat_filter(
    clips: &[SceneClip],
    plan: &TimelinePlan,
    width: u32,
    height: u32,
    fps: u32,
) -> String {
    let mut chains: Vec<String> = Vec::new();

    // Normalize every input to a shared geometry and timebase; xfade and
    // concat both require identical stream parameters.
    for i in 0..clips.len() {
        chains.push(format!(
            "[{i}:v]scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},\
             format=yuv420p,settb=AVTB[v{i}]"
        ));
        chains.push(format!(
            "[{i}:a]aresample=44100,aformat=sample_fmts=fltp:channel_layouts=stereo[a{i}]"
        ));
    }

    // Split into runs at hard-cut boundaries.
    let mut runs: Vec<Vec<usize>> = vec![vec![0]];
    for (i, boundary) in plan.boundaries.iter().enumerate() {
        if boundary.transition == Transition::None {
            runs.push(Vec::new());
        }
        runs.last_mut().expect("runs is non-empty").push(i + 1);
    }

    // Merge each run with xfade/acrossfade chains.
    let mut run_labels: Vec<(String, String)> = Vec::new();
    for (run_idx, run) in runs.iter().enumerate() {
        let first = run[0];
        if run.len() == 1 {
            run_labels.push((format!("[v{first}]"), format!("[a{first}]")));
            continue;
        }

        let run_start = plan.placements[first].start_secs;
        let mut v_label = format!("[v{first}]");
        let mut a_label = format!("[a{first}]");
        for (step, &clip_idx) in run.iter().enumerate().skip(1) {
            let boundary = &plan.boundaries[clip_idx - 1];
            let name = xfade_name(boundary.transition).expect("run boundaries carry transitions");
            let offset = boundary.start_secs - run_start;
            let v_out = format!("[r{run_idx}v{step}]");
            let a_out = format!("[r{run_idx}a{step}]");
            chains.push(format!(
                "{v_label}[v{clip_idx}]xfade=transition={name}:duration={:.3}:offset={:.3}{v_out}",
                boundary.overlap_secs, offset
            ));
            chains.push(format!(
                "{a_label}[a{clip_idx}]acrossfade=d={:.3}{a_out}",
                boundary.overlap_secs
            ));
            v_label = v_out;
            a_label = a_out;
        }
        run_labels.push((v_label, a_label));
    }

    // Join the runs.
    if run_labels.len() == 1 {
        let (v, a) = run_labels.remove(0);
        chains.push(format!("{v}null[outv]"));
        chains.push(format!("{a}anull[outa]"));
    } else {
        let inputs: String = run_labels
            .iter()
            .map(|(v, a)| format!("{v}{a}"))
            .collect();
        chains.push(format!(
            "{inputs}concat=n={}:v=1:a=1[outv][outa]",
            run_labels.len()
        ));
    }

    chains.join(";")
}
