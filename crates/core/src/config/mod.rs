use std::{fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    assembly::GifSettings, export::ExportSettings, timeline::FrameCount, AnimatorError,
    ParameterTrack, Result,
};

const DEFAULT_FRAME_DELAY_MS: u32 = 100;

/// Top-level configuration structure for an animation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: Option<PathBuf>,
    pub frames: FrameSpec,
    pub tracks: Vec<ParameterTrack>,
    pub export: ExportSettings,
    pub gif: GifConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents).map_err(|err| {
            AnimatorError::invalid(format!("failed to parse config {}: {err}", path.display()))
        })
    }

    pub fn from_json(contents: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// GIF options for this run, or `None` when GIF output is disabled.
    pub fn gif_settings(&self) -> Option<GifSettings> {
        self.gif.enabled.then(|| self.gif.settings(&self.frames))
    }
}

/// How the number of frames is chosen: either directly or from a duration
/// and frame rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameSpec {
    Count { count: u32 },
    Timed { duration_seconds: f64, fps: f64 },
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self::Count { count: 10 }
    }
}

impl FrameSpec {
    pub fn frame_count(&self) -> Result<FrameCount> {
        match *self {
            Self::Count { count } => FrameCount::new(count),
            Self::Timed {
                duration_seconds,
                fps,
            } => FrameCount::from_duration(duration_seconds, fps),
        }
    }

    pub fn fps(&self) -> Option<f64> {
        match *self {
            Self::Count { .. } => None,
            Self::Timed { fps, .. } => Some(fps),
        }
    }
}

/// Configuration specific to GIF output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GifConfig {
    pub enabled: bool,
    pub loop_infinite: bool,
    /// Explicit per-frame delay. Derived from the fps when unset.
    pub frame_delay_ms: Option<u32>,
    pub speed: i32,
}

impl Default for GifConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            loop_infinite: true,
            frame_delay_ms: None,
            speed: GifSettings::default().speed,
        }
    }
}

impl GifConfig {
    pub fn settings(&self, frames: &FrameSpec) -> GifSettings {
        let frame_delay_ms = self.frame_delay_ms.unwrap_or_else(|| {
            frames
                .fps()
                .filter(|fps| fps.is_finite() && *fps > 0.0)
                .map(|fps| (1000.0 / fps).round().max(1.0) as u32)
                .unwrap_or(DEFAULT_FRAME_DELAY_MS)
        });
        GifSettings {
            loop_infinite: self.loop_infinite,
            frame_delay_ms,
            speed: self.speed,
        }
    }
}
