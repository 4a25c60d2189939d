//! Multi-frame GIF assembly.
//!
//! Frames are validated for a common size up front, then decoded and encoded
//! one at a time so at most one decoded frame is alive. A failed encode pass
//! is retried once from freshly decoded frames. The container is only written
//! to disk once it is complete.

use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use image::{
    codecs::gif::GifEncoder,
    error::{ParameterError, ParameterErrorKind},
    Delay, Frame, ImageError, ImageResult, RgbaImage,
};
use serde::{Deserialize, Serialize};

use crate::{looping, render::parse_frame_index, AssemblyError};

/// File name of the assembled container inside the output folder.
pub const GIF_FILE_NAME: &str = "animation.gif";

const MAX_ATTEMPTS: u32 = 2;
const SPEED_RANGE: std::ops::RangeInclusive<i32> = 1..=30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded still frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameImage {
    pixels: RgbaImage,
}

impl FrameImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width(), self.height())
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

/// Ordered frames the assembler can (re)load on demand.
///
/// An index outside `0..len()` is reported as an [`ImageError`].
pub trait FrameSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimensions of frame `index`, read without decoding pixels where
    /// possible.
    fn size(&self, index: usize) -> ImageResult<FrameSize>;

    /// Decodes frame `index` from scratch.
    fn load(&self, index: usize) -> ImageResult<FrameImage>;
}

/// Frame images stored as files, in playback order.
#[derive(Debug, Clone, Default)]
pub struct FrameFiles {
    paths: Vec<PathBuf>,
}

impl FrameFiles {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Collects the `frame_NNN.png` files in `dir`, ordered by frame index.
    /// Other files are ignored.
    ///
    /// Fails when two files name the same index with different padding,
    /// e.g. `frame_007.png` left over next to `frame_0007.png`.
    pub fn scan(dir: &Path) -> io::Result<Self> {
        let mut frames = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(index) = entry.file_name().to_str().and_then(parse_frame_index) {
                frames.push((index, entry.path()));
            }
        }
        frames.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        if let Some(pair) = frames.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "frame {} appears more than once: {} and {}",
                    pair[0].0,
                    pair[0].1.display(),
                    pair[1].1.display()
                ),
            ));
        }
        Ok(Self::new(frames.into_iter().map(|(_, path)| path).collect()))
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn path(&self, index: usize) -> ImageResult<&Path> {
        self.paths
            .get(index)
            .map(PathBuf::as_path)
            .ok_or_else(|| out_of_range(index, self.paths.len()))
    }
}

impl FrameSource for FrameFiles {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn size(&self, index: usize) -> ImageResult<FrameSize> {
        let (width, height) = image::image_dimensions(self.path(index)?)?;
        Ok(FrameSize::new(width, height))
    }

    fn load(&self, index: usize) -> ImageResult<FrameImage> {
        Ok(FrameImage::new(image::open(self.path(index)?)?.into_rgba8()))
    }
}

/// Frames that are already decoded. Each load hands out a copy.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFrames {
    images: Vec<RgbaImage>,
}

impl InMemoryFrames {
    pub fn new(images: Vec<RgbaImage>) -> Self {
        Self { images }
    }
}

impl FrameSource for InMemoryFrames {
    fn len(&self) -> usize {
        self.images.len()
    }

    fn size(&self, index: usize) -> ImageResult<FrameSize> {
        let (width, height) = self.image(index)?.dimensions();
        Ok(FrameSize::new(width, height))
    }

    fn load(&self, index: usize) -> ImageResult<FrameImage> {
        Ok(FrameImage::new(self.image(index)?.clone()))
    }
}

impl InMemoryFrames {
    fn image(&self, index: usize) -> ImageResult<&RgbaImage> {
        self.images
            .get(index)
            .ok_or_else(|| out_of_range(index, self.images.len()))
    }
}

fn out_of_range(index: usize, len: usize) -> ImageError {
    ImageError::Parameter(ParameterError::from_kind(ParameterErrorKind::Generic(
        format!("frame {index} is out of range for {len} frames"),
    )))
}

/// Options for GIF output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GifSettings {
    /// Insert the Netscape loop extension after encoding.
    pub loop_infinite: bool,
    pub frame_delay_ms: u32,
    /// NeuQuant speed, 1 (best) to 30 (fastest).
    pub speed: i32,
}

impl Default for GifSettings {
    fn default() -> Self {
        Self {
            loop_infinite: true,
            frame_delay_ms: 100,
            speed: 10,
        }
    }
}

/// An encoded GIF. The byte buffer is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct GifContainer {
    bytes: Vec<u8>,
    frame_count: usize,
    size: FrameSize,
    loop_infinite: bool,
}

impl GifContainer {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    pub fn loop_infinite(&self) -> bool {
        self.loop_infinite
    }

    /// Adds the infinite-loop extension. A patch failure is logged and the
    /// container is kept as is, without looping.
    pub fn with_infinite_loop(mut self) -> Self {
        match looping::patch_infinite_loop(&self.bytes) {
            Ok(patched) => {
                self.bytes = patched;
                self.loop_infinite = true;
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not add loop extension, gif will play once");
            }
        }
        self
    }

    /// Writes the container to `path`. See [`write_atomically`].
    pub fn write_to(&self, path: &Path) -> Result<(), AssemblyError> {
        write_atomically(path, &self.bytes)
    }
}

/// Writes `bytes` to `path` through a temporary file in the same directory,
/// so `path` only ever holds either its old content or the complete new one.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), AssemblyError> {
    let write_err = |source| AssemblyError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

/// Builds multi-frame GIF containers from same-sized frames.
#[derive(Debug, Clone, Default)]
pub struct GifAssembler {
    settings: GifSettings,
}

impl GifAssembler {
    pub fn new(mut settings: GifSettings) -> Self {
        settings.speed = settings.speed.clamp(*SPEED_RANGE.start(), *SPEED_RANGE.end());
        Self { settings }
    }

    pub fn settings(&self) -> &GifSettings {
        &self.settings
    }

    /// Encodes, optionally loop-patches, and writes the container to
    /// `output`. On error nothing is written.
    pub fn assemble<S>(&self, source: &S, output: &Path) -> Result<GifContainer, AssemblyError>
    where
        S: FrameSource + ?Sized,
    {
        let mut container = self.encode(source)?;
        if self.settings.loop_infinite {
            container = container.with_infinite_loop();
        }
        container.write_to(output)?;
        tracing::info!(
            path = %output.display(),
            frames = container.frame_count,
            size = %container.size,
            looping = container.loop_infinite,
            "gif written"
        );
        Ok(container)
    }

    /// Encodes every frame of `source` into an in-memory container without
    /// the loop extension.
    pub fn encode<S>(&self, source: &S) -> Result<GifContainer, AssemblyError>
    where
        S: FrameSource + ?Sized,
    {
        let size = check_sizes(source)?;

        let bytes = match self.encode_once(source, size) {
            Ok(bytes) => bytes,
            Err(err) if err.is_transient() => {
                tracing::warn!(error = %err, "gif encoding failed, retrying from freshly decoded frames");
                self.encode_once(source, size).map_err(|err| match err {
                    AssemblyError::Decode { source, .. }
                    | AssemblyError::EncodeFailed { source, .. } => AssemblyError::EncodeFailed {
                        attempts: MAX_ATTEMPTS,
                        source,
                    },
                    other => other,
                })?
            }
            Err(err) => return Err(err),
        };

        Ok(GifContainer {
            bytes,
            frame_count: source.len(),
            size,
            loop_infinite: false,
        })
    }

    fn encode_once<S>(&self, source: &S, expected: FrameSize) -> Result<Vec<u8>, AssemblyError>
    where
        S: FrameSource + ?Sized,
    {
        let delay = Delay::from_saturating_duration(Duration::from_millis(u64::from(
            self.settings.frame_delay_ms,
        )));
        let mut bytes = Vec::new();
        {
            // The trailer is written when the encoder drops.
            let mut encoder = GifEncoder::new_with_speed(&mut bytes, self.settings.speed);
            for index in 0..source.len() {
                let image = source
                    .load(index)
                    .map_err(|source| AssemblyError::Decode { index, source })?;
                if image.size() != expected {
                    return Err(AssemblyError::SizeMismatch {
                        index,
                        expected,
                        found: image.size(),
                    });
                }
                // Ownership of the pixels moves into the encoder; they are
                // released as soon as the frame is written.
                encoder
                    .encode_frame(Frame::from_parts(image.into_pixels(), 0, 0, delay))
                    .map_err(|source| AssemblyError::EncodeFailed {
                        attempts: 1,
                        source,
                    })?;
                if (index + 1) % 10 == 0 {
                    tracing::debug!(frames = index + 1, "added frames to gif");
                }
            }
        }
        Ok(bytes)
    }
}

fn check_sizes<S>(source: &S) -> Result<FrameSize, AssemblyError>
where
    S: FrameSource + ?Sized,
{
    if source.is_empty() {
        return Err(AssemblyError::Empty);
    }
    let size_of = |index| {
        source
            .size(index)
            .map_err(|source| AssemblyError::Decode { index, source })
    };
    let expected = size_of(0)?;
    for index in 1..source.len() {
        let found = size_of(index)?;
        if found != expected {
            return Err(AssemblyError::SizeMismatch {
                index,
                expected,
                found,
            });
        }
    }
    Ok(expected)
}
