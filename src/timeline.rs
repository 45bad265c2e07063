use std::path::PathBuf;

use crate::{
    error::{ScenecastError, ScenecastResult},
    model::Transition,
};

/// One rendered scene segment, owned by the job that produced it and deleted
/// with the job's working directory.
#[derive(Clone, Debug)]
pub struct SceneClip {
    pub scene_id: String,
    pub path: PathBuf,
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// A boundary between two adjacent clips, carrying the transition chosen on
/// the earlier scene. `start_secs` is where the transition begins on the
/// merged timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Boundary {
    pub transition: Transition,
    pub overlap_secs: f64,
    pub start_secs: f64,
}

/// Placement of one clip on the merged timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// The fully resolved concatenation plan. Pure data; the media backend turns
/// it into an ffmpeg filter graph.
#[derive(Clone, Debug)]
pub struct TimelinePlan {
    pub placements: Vec<Placement>,
    pub boundaries: Vec<Boundary>,
    pub total_duration_secs: f64,
}

/// Resolve clip placements and transition boundaries.
///
/// Each non-`None` transition overlaps the two adjacent clips by the window,
/// so the merged runtime is `sum(durations) - sum(overlaps)`. The window is
/// clamped so it never exceeds either neighbouring clip.
pub fn plan_timeline(
    clips: &[SceneClip],
    transitions: &[Transition],
    overlap_window_secs: f64,
) -> ScenecastResult<TimelinePlan> {
    if clips.is_empty() {
        return Err(ScenecastError::validation(
            "cannot plan a timeline with zero clips",
        ));
    }
    if transitions.len() + 1 != clips.len() {
        return Err(ScenecastError::validation(format!(
            "{} clips require {} transitions, got {}",
            clips.len(),
            clips.len() - 1,
            transitions.len()
        )));
    }
    for clip in clips {
        if !clip.duration_secs.is_finite() || clip.duration_secs <= 0.0 {
            return Err(ScenecastError::validation(format!(
                "clip for scene '{}' has non-positive duration",
                clip.scene_id
            )));
        }
    }

    let mut placements = Vec::with_capacity(clips.len());
    let mut boundaries = Vec::with_capacity(transitions.len());
    let mut cursor = 0.0_f64;

    for (i, clip) in clips.iter().enumerate() {
        placements.push(Placement {
            start_secs: cursor,
            duration_secs: clip.duration_secs,
        });
        let end = cursor + clip.duration_secs;

        if i < transitions.len() {
            let requested = transitions[i].overlap_secs(overlap_window_secs);
            let overlap = requested
                .min(clip.duration_secs)
                .min(clips[i + 1].duration_secs);
            boundaries.push(Boundary {
                transition: transitions[i],
                overlap_secs: overlap,
                start_secs: end - overlap,
            });
            cursor = end - overlap;
        } else {
            cursor = end;
        }
    }

    Ok(TimelinePlan {
        placements,
        boundaries,
        total_duration_secs: cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(id: &str, duration: f64) -> SceneClip {
        SceneClip {
            scene_id: id.to_string(),
            path: PathBuf::from(format!("{id}.mp4")),
            duration_secs: duration,
            width: 1280,
            height: 720,
        }
    }

    #[test]
    fn hard_cuts_sum_durations() {
        let clips = vec![clip("a", 2.0), clip("b", 3.0), clip("c", 4.0)];
        let plan =
            plan_timeline(&clips, &[Transition::None, Transition::None], 0.4).unwrap();
        assert_eq!(plan.total_duration_secs, 9.0);
        assert_eq!(plan.placements[1].start_secs, 2.0);
        assert_eq!(plan.placements[2].start_secs, 5.0);
        assert!(plan.boundaries.iter().all(|b| b.overlap_secs == 0.0));
    }

    #[test]
    fn each_transition_shortens_runtime_by_its_overlap() {
        let clips = vec![clip("a", 2.0), clip("b", 3.0), clip("c", 4.0)];
        let plan =
            plan_timeline(&clips, &[Transition::Fade, Transition::Zoom], 0.5).unwrap();
        assert!((plan.total_duration_secs - 8.0).abs() < 1e-9);
        // Second clip starts where the fade begins.
        assert!((plan.boundaries[0].start_secs - 1.5).abs() < 1e-9);
        assert!((plan.placements[1].start_secs - 1.5).abs() < 1e-9);
    }

    #[test]
    fn mixed_boundaries_match_spec_arithmetic() {
        // fade between 1-2, hard cut between 2-3.
        let clips = vec![clip("a", 3.0), clip("b", 3.0), clip("c", 3.0)];
        let plan =
            plan_timeline(&clips, &[Transition::Fade, Transition::None], 0.4).unwrap();
        assert!((plan.total_duration_secs - (9.0 - 0.4)).abs() < 1e-9);
    }

    #[test]
    fn overlap_is_clamped_to_the_shorter_neighbour() {
        let clips = vec![clip("a", 0.2), clip("b", 5.0)];
        let plan = plan_timeline(&clips, &[Transition::Fade], 0.5).unwrap();
        assert!((plan.boundaries[0].overlap_secs - 0.2).abs() < 1e-9);
        assert!((plan.total_duration_secs - 5.0).abs() < 1e-9);
    }

    #[test]
    fn single_clip_needs_no_transitions() {
        let clips = vec![clip("only", 6.5)];
        let plan = plan_timeline(&clips, &[], 0.4).unwrap();
        assert_eq!(plan.total_duration_secs, 6.5);
        assert!(plan.boundaries.is_empty());
    }

    #[test]
    fn rejects_mismatched_transition_count() {
        let clips = vec![clip("a", 1.0), clip("b", 1.0)];
        assert!(plan_timeline(&clips, &[], 0.4).is_err());
        assert!(plan_timeline(&[], &[], 0.4).is_err());
    }

    #[test]
    fn rejects_nonpositive_clip_duration() {
        let clips = vec![clip("a", 0.0)];
        assert!(plan_timeline(&clips, &[], 0.4).is_err());
    }
}
