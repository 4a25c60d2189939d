use std::path::{Path, PathBuf};

use crate::{export::ResolvedSize, timeline::FrameValues, Result};

const FRAME_PREFIX: &str = "frame_";
const FRAME_EXTENSION: &str = "png";
const MIN_INDEX_DIGITS: usize = 3;

/// The document whose parameters are animated. Owned exclusively by the
/// orchestrator for the duration of a run.
pub trait HostModel {
    /// Writes every value of `values` into the model before its frame is
    /// rendered.
    fn apply(&mut self, values: &FrameValues) -> Result<()>;
}

/// Produces exactly one still image file per call from the current state of
/// the host model.
///
/// Calls are synchronous and strictly ordered; an error aborts the run.
pub trait FrameRenderer<H: ?Sized> {
    fn render(&mut self, host: &H, target: &FrameTarget) -> Result<()>;
}

/// Where and how large a single frame should be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTarget {
    pub index: u32,
    pub path: PathBuf,
    pub size: ResolvedSize,
}

/// Number of digits used for frame indices in a run of `frame_count` frames.
///
/// Never fewer than three; longer runs widen so lexical order of the file
/// names stays equal to numeric order.
pub fn index_digits(frame_count: u32) -> usize {
    let last = frame_count.saturating_sub(1);
    last.to_string().len().max(MIN_INDEX_DIGITS)
}

/// `frame_007.png` style file name for `index`.
pub fn frame_file_name(index: u32, frame_count: u32) -> String {
    format!(
        "{FRAME_PREFIX}{index:0width$}.{FRAME_EXTENSION}",
        width = index_digits(frame_count)
    )
}

pub fn frame_path(dir: &Path, index: u32, frame_count: u32) -> PathBuf {
    dir.join(frame_file_name(index, frame_count))
}

/// Parses the index back out of a frame file name, if it is one.
pub fn parse_frame_index(file_name: &str) -> Option<u32> {
    let digits = file_name
        .strip_prefix(FRAME_PREFIX)?
        .strip_suffix(FRAME_EXTENSION)?
        .strip_suffix('.')?;
    if digits.len() < MIN_INDEX_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_three_digits() {
        assert_eq!(frame_file_name(0, 5), "frame_000.png");
        assert_eq!(frame_file_name(42, 100), "frame_042.png");
        assert_eq!(frame_file_name(999, 1000), "frame_999.png");
    }

    #[test]
    fn widens_for_long_runs() {
        assert_eq!(frame_file_name(7, 1001), "frame_0007.png");
        assert_eq!(frame_file_name(1000, 1001), "frame_1000.png");
    }

    #[test]
    fn lexical_order_matches_numeric_order() {
        let count = 1200;
        let mut names: Vec<String> = (0..count).map(|i| frame_file_name(i, count)).collect();
        let numeric = names.clone();
        names.sort();
        assert_eq!(names, numeric);
    }

    #[test]
    fn parses_frame_names() {
        assert_eq!(parse_frame_index("frame_012.png"), Some(12));
        assert_eq!(parse_frame_index("frame_1000.png"), Some(1000));
        assert_eq!(parse_frame_index("frame_12.png"), None);
        assert_eq!(parse_frame_index("frame_abc.png"), None);
        assert_eq!(parse_frame_index("animation.gif"), None);
        assert_eq!(parse_frame_index("frame_001.gif"), None);
    }
}
