use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AnimatorError, Result};

/// One host parameter swept linearly from `min` to `max` across the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackDescriptor")]
pub struct ParameterTrack {
    name: String,
    min: f64,
    max: f64,
}

impl ParameterTrack {
    /// Creates a track, rejecting empty names, non-finite bounds and
    /// zero-width ranges.
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AnimatorError::invalid("parameter track needs a name"));
        }
        if !min.is_finite() || !max.is_finite() {
            return Err(AnimatorError::invalid(format!(
                "parameter `{name}` has non-numeric bounds ({min}, {max})"
            )));
        }
        if min == max {
            return Err(AnimatorError::invalid(format!(
                "parameter `{name}` has identical min and max ({min})"
            )));
        }
        Ok(Self { name, min, max })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Parses `name=min:max`, e.g. `Width=0:100`.
impl FromStr for ParameterTrack {
    type Err = AnimatorError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, range) = s.split_once('=').ok_or_else(|| {
            AnimatorError::invalid(format!("expected `name=min:max`, got `{s}`"))
        })?;
        let (min, max) = range.split_once(':').ok_or_else(|| {
            AnimatorError::invalid(format!("expected `min:max` after `{name}=`, got `{range}`"))
        })?;
        Self::new(name.trim(), parse_bound(name, min)?, parse_bound(name, max)?)
    }
}

fn parse_bound(name: &str, raw: &str) -> Result<f64> {
    raw.trim().parse::<f64>().map_err(|_| {
        AnimatorError::invalid(format!("parameter `{name}` has non-numeric bound `{raw}`"))
    })
}

/// Serialized form of a track. Bounds default to the `0..100` sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub name: String,
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_track_max")]
    pub max: f64,
}

fn default_track_max() -> f64 {
    100.0
}

impl TryFrom<TrackDescriptor> for ParameterTrack {
    type Error = AnimatorError;

    fn try_from(value: TrackDescriptor) -> Result<Self> {
        Self::new(value.name, value.min, value.max)
    }
}

/// Number of frames in a run. Always at least two so the step is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameCount(u32);

impl FrameCount {
    pub const MIN: u32 = 2;

    pub fn new(count: u32) -> Result<Self> {
        if count < Self::MIN {
            return Err(AnimatorError::invalid(format!(
                "an animation needs at least {} frames, got {count}",
                Self::MIN
            )));
        }
        Ok(Self(count))
    }

    /// Derives the count as `ceil(duration * fps)`.
    pub fn from_duration(duration_seconds: f64, fps: f64) -> Result<Self> {
        if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
            return Err(AnimatorError::invalid(format!(
                "duration must be a positive number of seconds, got {duration_seconds}"
            )));
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(AnimatorError::invalid(format!(
                "fps must be a positive number, got {fps}"
            )));
        }
        let frames = (duration_seconds * fps).ceil();
        if frames > f64::from(u32::MAX) {
            return Err(AnimatorError::invalid(format!(
                "{duration_seconds}s at {fps} fps produces too many frames"
            )));
        }
        Self::new(frames as u32)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// The index of the last frame.
    pub fn last_index(self) -> u32 {
        self.0 - 1
    }
}

impl TryFrom<u32> for FrameCount {
    type Error = AnimatorError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

/// Interpolated value of `track` at `frame_index`.
///
/// `value_at(track, 0, n) == min` and `value_at(track, n - 1, n) == max`;
/// the sequence is monotonic in the direction of `max - min`.
pub fn value_at(track: &ParameterTrack, frame_index: u32, frame_count: FrameCount) -> Result<f64> {
    if frame_index >= frame_count.get() {
        return Err(AnimatorError::invalid(format!(
            "frame index {frame_index} is outside a {}-frame animation",
            frame_count.get()
        )));
    }
    let step = (track.max - track.min) / f64::from(frame_count.last_index());
    Ok(track.min + f64::from(frame_index) * step)
}

/// A single parameter assignment for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    pub value: f64,
}

/// All parameter values for one frame, in track order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameValues {
    frame: u32,
    values: Vec<ParameterValue>,
}

impl FrameValues {
    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn values(&self) -> &[ParameterValue] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|value| value.name == name)
            .map(|value| value.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterValue> {
        self.values.iter()
    }
}

/// The set of tracks for a run together with its frame count. Sampling is
/// pure, so any frame can be recomputed at any time.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTimeline {
    tracks: Vec<ParameterTrack>,
    frame_count: FrameCount,
}

impl ParameterTimeline {
    /// Rejects an empty track list and duplicate track names.
    pub fn new(tracks: Vec<ParameterTrack>, frame_count: FrameCount) -> Result<Self> {
        if tracks.is_empty() {
            return Err(AnimatorError::invalid("no parameters selected for animation"));
        }
        for (i, track) in tracks.iter().enumerate() {
            if tracks[..i].iter().any(|other| other.name == track.name) {
                return Err(AnimatorError::invalid(format!(
                    "parameter `{}` is listed more than once",
                    track.name
                )));
            }
        }
        Ok(Self {
            tracks,
            frame_count,
        })
    }

    pub fn tracks(&self) -> &[ParameterTrack] {
        &self.tracks
    }

    pub fn frame_count(&self) -> FrameCount {
        self.frame_count
    }

    pub fn sample(&self, frame_index: u32) -> Result<FrameValues> {
        let values = self
            .tracks
            .iter()
            .map(|track| {
                Ok(ParameterValue {
                    name: track.name.clone(),
                    value: value_at(track, frame_index, self.frame_count)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FrameValues {
            frame: frame_index,
            values,
        })
    }
}
