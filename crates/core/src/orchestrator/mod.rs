//! Drives a whole animation run: sample, apply, render, then optionally
//! assemble the rendered frames into a GIF.

use std::path::{Path, PathBuf};

use crate::{
    assembly::{FrameFiles, FrameSize, GifAssembler, GifSettings, GIF_FILE_NAME},
    config::AppConfig,
    export::{ExportSettings, ResolvedSize},
    render::{frame_path, FrameRenderer, FrameTarget, HostModel},
    timeline::{FrameCount, ParameterTimeline, ParameterTrack},
    AnimatorError, Result,
};

/// Everything a run needs, validated once and immutable afterwards.
#[derive(Debug, Clone)]
pub struct AnimationRequest {
    timeline: ParameterTimeline,
    export: ExportSettings,
    size: ResolvedSize,
    output_dir: PathBuf,
    gif: Option<GifSettings>,
}

impl AnimationRequest {
    /// Validates the inputs. Any failure here happens before a single frame
    /// is rendered.
    pub fn new(
        tracks: Vec<ParameterTrack>,
        frame_count: FrameCount,
        export: ExportSettings,
        output_dir: impl Into<PathBuf>,
        gif: Option<GifSettings>,
    ) -> Result<Self> {
        let output_dir = output_dir.into();
        if output_dir.as_os_str().is_empty() {
            return Err(AnimatorError::invalid("no output folder selected"));
        }
        if !output_dir.is_dir() {
            return Err(AnimatorError::invalid(format!(
                "output folder not found: {}",
                output_dir.display()
            )));
        }

        let timeline = ParameterTimeline::new(tracks, frame_count)?;
        let size = export.resolve()?;

        Ok(Self {
            timeline,
            export,
            size,
            output_dir,
            gif,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let output_dir = config
            .output_dir
            .clone()
            .ok_or_else(|| AnimatorError::invalid("no output folder selected"))?;
        Self::new(
            config.tracks.clone(),
            config.frames.frame_count()?,
            config.export,
            output_dir,
            config.gif_settings(),
        )
    }

    pub fn timeline(&self) -> &ParameterTimeline {
        &self.timeline
    }

    pub fn frame_count(&self) -> FrameCount {
        self.timeline.frame_count()
    }

    pub fn export(&self) -> &ExportSettings {
        &self.export
    }

    pub fn size(&self) -> ResolvedSize {
        self.size
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn gif(&self) -> Option<&GifSettings> {
        self.gif.as_ref()
    }

    pub fn frame_path(&self, index: u32) -> PathBuf {
        frame_path(&self.output_dir, index, self.frame_count().get())
    }

    pub fn gif_path(&self) -> PathBuf {
        self.output_dir.join(GIF_FILE_NAME)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Rendered frame files, in frame order.
    pub frames: Vec<PathBuf>,
    pub size: ResolvedSize,
    pub gif: Option<GifSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifSummary {
    pub path: PathBuf,
    pub frame_count: usize,
    pub size: FrameSize,
    /// False when the loop extension could not be added.
    pub loop_infinite: bool,
}

/// Runs one [`AnimationRequest`] strictly frame by frame.
///
/// Frame `i + 1` never starts before frame `i` is rendered. The first
/// failing frame aborts the run; frames rendered before it stay on disk and
/// no GIF is assembled.
#[derive(Debug, Clone)]
pub struct AnimationOrchestrator {
    request: AnimationRequest,
}

impl AnimationOrchestrator {
    pub fn new(request: AnimationRequest) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &AnimationRequest {
        &self.request
    }

    pub fn run<H, R>(&self, host: &mut H, renderer: &mut R) -> Result<RunReport>
    where
        H: HostModel + ?Sized,
        R: FrameRenderer<H> + ?Sized,
    {
        self.run_with_progress(host, renderer, |_, _| {})
    }

    /// Like [`run`](Self::run), calling `progress(done, total)` after every
    /// rendered frame.
    pub fn run_with_progress<H, R, P>(
        &self,
        host: &mut H,
        renderer: &mut R,
        mut progress: P,
    ) -> Result<RunReport>
    where
        H: HostModel + ?Sized,
        R: FrameRenderer<H> + ?Sized,
        P: FnMut(u32, u32),
    {
        let request = &self.request;
        let total = request.frame_count().get();
        let size = request.size();
        tracing::info!(
            frames = total,
            params = request.timeline().tracks().len(),
            dpi = request.export().dpi,
            pixel_size = request.export().pixel_size,
            scale = request.export().scale,
            "starting animation"
        );

        let mut frames = Vec::with_capacity(total as usize);
        for index in 0..total {
            tracing::info!(frame = index + 1, total, "processing frame");
            let values = request.timeline().sample(index)?;
            for value in values.iter() {
                tracing::debug!(frame = index, parameter = %value.name, value = value.value, "setting parameter");
            }
            host.apply(&values).map_err(|err| match err {
                AnimatorError::Apply { .. } => err,
                other => AnimatorError::apply(index, other.to_string()),
            })?;

            let target = FrameTarget {
                index,
                path: request.frame_path(index),
                size,
            };
            tracing::info!(
                frame = index,
                path = %target.path.display(),
                dpi = %size.effective_dpi(),
                pixel_size = size.pixel_size,
                "exporting frame"
            );
            renderer.render(host, &target).map_err(|err| match err {
                AnimatorError::Render { .. } => err,
                other => AnimatorError::render(index, other.to_string()),
            })?;

            frames.push(target.path);
            progress(index + 1, total);
        }
        tracing::info!(frames = total, "animation finished");

        let gif = match request.gif() {
            Some(settings) => {
                let path = request.gif_path();
                let container = GifAssembler::new(settings.clone())
                    .assemble(&FrameFiles::new(frames.clone()), &path)?;
                Some(GifSummary {
                    path,
                    frame_count: container.frame_count(),
                    size: container.size(),
                    loop_infinite: container.loop_infinite(),
                })
            }
            None => {
                tracing::debug!("gif output not requested");
                None
            }
        };

        Ok(RunReport { frames, size, gif })
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Cursor};

    use image::{codecs::gif::GifDecoder, AnimationDecoder, Rgba, RgbaImage};
    use tempfile::TempDir;

    use super::*;
    use crate::{looping::has_loop_extension, timeline::FrameValues, AssemblyError};

    #[derive(Default)]
    struct RecordingHost {
        applied: Vec<FrameValues>,
    }

    impl HostModel for RecordingHost {
        fn apply(&mut self, values: &FrameValues) -> Result<()> {
            self.applied.push(values.clone());
            Ok(())
        }
    }

    /// Writes a square frame shaded by the `level` parameter.
    #[derive(Default)]
    struct ShadeRenderer {
        fail_at: Option<u32>,
        tall_from: Option<u32>,
        rendered: Vec<u32>,
    }

    impl FrameRenderer<RecordingHost> for ShadeRenderer {
        fn render(&mut self, host: &RecordingHost, target: &FrameTarget) -> Result<()> {
            if self.fail_at == Some(target.index) {
                return Err(AnimatorError::invalid("view is not printable"));
            }
            let values = host.applied.last().expect("values applied before render");
            assert_eq!(values.frame(), target.index);

            let side = target.size.pixel_size;
            let height = match self.tall_from {
                Some(from) if target.index >= from => side + 1,
                _ => side,
            };
            let shade = values.get("level").unwrap_or_default() as u8;
            RgbaImage::from_pixel(side, height, Rgba([shade, shade, shade, 255]))
                .save(&target.path)
                .map_err(|err| AnimatorError::render(target.index, err.to_string()))?;
            self.rendered.push(target.index);
            Ok(())
        }
    }

    fn small_export() -> ExportSettings {
        ExportSettings {
            dpi: 72,
            pixel_size: 8,
            scale: 1.0,
        }
    }

    fn request(dir: &Path, frames: u32, gif: Option<GifSettings>) -> AnimationRequest {
        AnimationRequest::new(
            vec![ParameterTrack::new("level", 0.0, 200.0).unwrap()],
            FrameCount::new(frames).unwrap(),
            small_export(),
            dir,
            gif,
        )
        .unwrap()
    }

    #[test]
    fn renders_every_frame_in_order() {
        let dir = TempDir::new().unwrap();
        let orchestrator = AnimationOrchestrator::new(request(dir.path(), 5, None));
        let mut host = RecordingHost::default();
        let mut renderer = ShadeRenderer::default();
        let mut progress = Vec::new();

        let report = orchestrator
            .run_with_progress(&mut host, &mut renderer, |done, total| {
                progress.push((done, total))
            })
            .unwrap();

        let levels: Vec<f64> = host
            .applied
            .iter()
            .map(|values| values.get("level").unwrap())
            .collect();
        assert_eq!(levels, vec![0.0, 50.0, 100.0, 150.0, 200.0]);
        assert_eq!(renderer.rendered, vec![0, 1, 2, 3, 4]);
        assert_eq!(progress, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
        assert_eq!(report.frames.len(), 5);
        assert!(report.frames.iter().all(|path| path.exists()));
        assert!(dir.path().join("frame_004.png").exists());
        assert!(report.gif.is_none());
        assert!(!dir.path().join(GIF_FILE_NAME).exists());
    }

    #[test]
    fn assembles_looping_gif_after_last_frame() {
        let dir = TempDir::new().unwrap();
        let orchestrator =
            AnimationOrchestrator::new(request(dir.path(), 3, Some(GifSettings::default())));

        let report = orchestrator
            .run(&mut RecordingHost::default(), &mut ShadeRenderer::default())
            .unwrap();

        let gif = report.gif.unwrap();
        assert_eq!(gif.path, dir.path().join(GIF_FILE_NAME));
        assert_eq!(gif.frame_count, 3);
        assert_eq!(gif.size, FrameSize::new(8, 8));
        assert!(gif.loop_infinite);

        let bytes = fs::read(&gif.path).unwrap();
        assert!(has_loop_extension(&bytes));
        let frames = GifDecoder::new(Cursor::new(bytes))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn render_failure_aborts_and_keeps_earlier_frames() {
        let dir = TempDir::new().unwrap();
        let orchestrator =
            AnimationOrchestrator::new(request(dir.path(), 4, Some(GifSettings::default())));
        let mut renderer = ShadeRenderer {
            fail_at: Some(2),
            ..ShadeRenderer::default()
        };

        let err = orchestrator
            .run(&mut RecordingHost::default(), &mut renderer)
            .unwrap_err();

        match err {
            AnimatorError::Render { frame, reason } => {
                assert_eq!(frame, 2);
                assert!(reason.contains("not printable"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(renderer.rendered, vec![0, 1]);
        assert!(dir.path().join("frame_001.png").exists());
        assert!(!dir.path().join("frame_002.png").exists());
        assert!(!dir.path().join(GIF_FILE_NAME).exists());
    }

    #[test]
    fn assembly_failure_keeps_rendered_frames() {
        let dir = TempDir::new().unwrap();
        let orchestrator =
            AnimationOrchestrator::new(request(dir.path(), 3, Some(GifSettings::default())));
        let mut renderer = ShadeRenderer {
            tall_from: Some(1),
            ..ShadeRenderer::default()
        };

        let err = orchestrator
            .run(&mut RecordingHost::default(), &mut renderer)
            .unwrap_err();

        assert!(matches!(
            err,
            AnimatorError::Assembly(AssemblyError::SizeMismatch { index: 1, .. })
        ));
        assert_eq!(FrameFiles::scan(dir.path()).unwrap().paths().len(), 3);
        assert!(!dir.path().join(GIF_FILE_NAME).exists());
    }

    #[test]
    fn rejects_invalid_requests_up_front() {
        let dir = TempDir::new().unwrap();
        let track = || vec![ParameterTrack::new("level", 0.0, 1.0).unwrap()];
        let frames = FrameCount::new(2).unwrap();

        let missing = dir.path().join("missing");
        let err = AnimationRequest::new(track(), frames, small_export(), &missing, None).unwrap_err();
        assert!(err.to_string().contains("missing"));

        assert!(AnimationRequest::new(track(), frames, small_export(), "", None).is_err());
        assert!(AnimationRequest::new(Vec::new(), frames, small_export(), dir.path(), None).is_err());

        let tiny = ExportSettings {
            pixel_size: 1,
            scale: 0.25,
            ..small_export()
        };
        assert!(AnimationRequest::new(track(), frames, tiny, dir.path(), None).is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn builds_request_from_config() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            output_dir: Some(dir.path().to_path_buf()),
            tracks: vec![ParameterTrack::new("level", 0.0, 1.0).unwrap()],
            export: ExportSettings {
                dpi: 1200,
                pixel_size: 8192,
                scale: 4.0,
            },
            ..AppConfig::default()
        };

        let request = AnimationRequest::from_config(&config).unwrap();
        assert_eq!(request.frame_count().get(), 10);
        assert!(request.size().clamped);
        assert_eq!(request.size().pixel_size, 15_000);
        assert!(request.gif().is_none());

        let without_dir = AppConfig {
            output_dir: None,
            ..config
        };
        assert!(AnimationRequest::from_config(&without_dir).is_err());
    }
}
