use crate::model::{OutputProfile, Quality, Resolution};

/// Concrete x264 settings derived from an [`OutputProfile`]. The table is
/// fixed at compile time; profiles never carry raw encoder knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderParams {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub crf: u8,
    /// Upper bound for the rate control, kbit/s.
    pub max_bitrate_kbps: u32,
    pub preset: &'static str,
    pub pix_fmt: &'static str,
}

/// Per-quality CRF. Lower is better; `ultra` approaches visually lossless.
fn crf_for(quality: Quality) -> u8 {
    match quality {
        Quality::Low => 30,
        Quality::Medium => 23,
        Quality::High => 20,
        Quality::Ultra => 17,
    }
}

fn preset_for(quality: Quality) -> &'static str {
    match quality {
        Quality::Low => "veryfast",
        Quality::Medium => "fast",
        Quality::High => "medium",
        Quality::Ultra => "slow",
    }
}

/// Bitrate ceiling scaled by pixel count relative to 1080p/medium at 8 Mbit/s.
fn max_bitrate_kbps_for(resolution: Resolution, quality: Quality) -> u32 {
    let base = match resolution {
        Resolution::R720p => 4_000,
        Resolution::R1080p => 8_000,
        Resolution::R4k => 24_000,
    };
    match quality {
        Quality::Low => base / 2,
        Quality::Medium => base,
        Quality::High => base * 3 / 2,
        Quality::Ultra => base * 2,
    }
}

pub fn encoder_params(profile: &OutputProfile) -> EncoderParams {
    let (width, height) = profile.resolution.dimensions();
    EncoderParams {
        width,
        height,
        fps: profile.fps,
        crf: crf_for(profile.quality),
        max_bitrate_kbps: max_bitrate_kbps_for(profile.resolution, profile.quality),
        preset: preset_for(profile.quality),
        pix_fmt: "yuv420p",
    }
}
