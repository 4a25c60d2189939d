use std::{fs, path::Path, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use param_animator_core::{
    assembly::{self, GIF_FILE_NAME},
    export::{self, PIXEL_SIZE_PRESETS, RESOLUTION_BUCKETS},
    looping, AnimationOrchestrator, AnimationRequest, AnimatorError, AppConfig, FrameFiles,
    FrameSource, FrameSpec, GifAssembler, GifSettings, ParameterTrack,
};
use tracing_subscriber::EnvFilter;

mod demo;

use demo::{ParameterSheet, SwatchRenderer};

fn main() -> param_animator_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => run_render(args),
        Commands::Gif {
            folder,
            no_loop,
            delay_ms,
        } => run_gif(&folder, !no_loop, delay_ms),
        Commands::Patch { file } => run_patch(&file),
        Commands::Scales {
            dpi,
            pixel_size,
            scale,
        } => {
            run_scales(dpi, pixel_size, scale);
            Ok(())
        }
    }
}

fn run_render(args: RenderArgs) -> param_animator_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    args.apply_to(&mut config);

    let export = &mut config.export;
    let scale = export::clamp_scale(export.dpi, export.pixel_size, export.scale);
    if scale != export.scale {
        tracing::warn!(
            requested = export.scale,
            clamped = scale,
            "scale factor is outside the accepted range, clamping"
        );
        export.scale = scale;
    }

    let request = AnimationRequest::from_config(&config)?;
    tracing::info!(
        output = %request.output_dir().display(),
        frames = request.frame_count().get(),
        pixel_size = request.size().pixel_size,
        "all checks passed"
    );

    let mut sheet = ParameterSheet::new(request.timeline().tracks());
    let mut renderer = SwatchRenderer;
    let report = AnimationOrchestrator::new(request).run_with_progress(
        &mut sheet,
        &mut renderer,
        |done, total| tracing::info!(done, total, "frame rendered"),
    )?;

    tracing::info!(frames = report.frames.len(), "done");
    if let Some(gif) = report.gif {
        tracing::info!(path = %gif.path.display(), looping = gif.loop_infinite, "gif created");
    }
    Ok(())
}

fn run_gif(folder: &Path, loop_infinite: bool, delay_ms: u32) -> param_animator_core::Result<()> {
    if !folder.is_dir() {
        return Err(AnimatorError::invalid(format!(
            "output folder does not exist: {}",
            folder.display()
        )));
    }

    let frames = FrameFiles::scan(folder)?;
    tracing::info!(count = frames.len(), folder = %folder.display(), "found frame files");

    let assembler = GifAssembler::new(GifSettings {
        loop_infinite,
        frame_delay_ms: delay_ms,
        ..GifSettings::default()
    });
    assembler.assemble(&frames, &folder.join(GIF_FILE_NAME))?;
    Ok(())
}

fn run_patch(file: &Path) -> param_animator_core::Result<()> {
    let bytes = fs::read(file)?;
    if looping::has_loop_extension(&bytes) {
        tracing::info!(path = %file.display(), "gif loop extension already exists");
        return Ok(());
    }
    let patched = looping::patch_infinite_loop(&bytes)?;
    assembly::write_atomically(file, &patched)?;
    tracing::info!(path = %file.display(), "gif loop extension added");
    Ok(())
}

fn run_scales(dpi: u32, pixel_size: u32, scale: Option<f64>) {
    let max = export::max_scale_factor(dpi, pixel_size);
    println!("max scale: {max:.2} (limit {} px)", export::MAX_PIXEL_SIZE);
    for choice in export::scale_choices(dpi, pixel_size) {
        println!("{choice:.2}x ({}%)", (choice * 100.0) as u32);
    }
    if let Some(scale) = scale {
        println!(
            "custom scale {scale} -> {:.2}",
            export::clamp_scale(dpi, pixel_size, scale)
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Parametric frame animation and GIF export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every frame of an animation, optionally followed by a GIF.
    Render(RenderArgs),
    /// Assemble the frame_NNN.png files of a folder into animation.gif.
    Gif {
        folder: PathBuf,
        /// Play the GIF once instead of looping forever.
        #[arg(long)]
        no_loop: bool,
        /// Delay between frames in milliseconds.
        #[arg(long, default_value_t = 100)]
        delay_ms: u32,
    },
    /// Add the infinite-loop extension to an existing GIF in place.
    Patch { file: PathBuf },
    /// Show which scale factors fit under the pixel limit.
    Scales {
        #[arg(long, default_value_t = 300, help = dpi_help())]
        dpi: u32,
        #[arg(long, default_value_t = 2048, help = pixel_size_help())]
        pixel_size: u32,
        /// Custom scale to clamp into range.
        #[arg(long)]
        scale: Option<f64>,
    },
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// JSON configuration file; flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Folder that receives the frames and the GIF.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Number of frames.
    #[arg(long, conflicts_with_all = ["duration", "fps"])]
    frames: Option<u32>,
    /// Duration in seconds; frames = ceil(duration * fps).
    #[arg(long, requires = "fps")]
    duration: Option<f64>,
    #[arg(long, requires = "duration")]
    fps: Option<f64>,
    /// Parameter to animate as `name=min:max`. Repeatable.
    #[arg(short, long = "track")]
    tracks: Vec<ParameterTrack>,
    #[arg(long, help = dpi_help())]
    dpi: Option<u32>,
    #[arg(long, help = pixel_size_help())]
    pixel_size: Option<u32>,
    #[arg(long)]
    scale: Option<f64>,
    /// Assemble animation.gif after the last frame.
    #[arg(long)]
    gif: bool,
    /// Do not add the infinite-loop extension to the GIF.
    #[arg(long)]
    no_loop: bool,
    /// Delay between GIF frames in milliseconds.
    #[arg(long)]
    delay_ms: Option<u32>,
}

impl RenderArgs {
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(output) = &self.output {
            config.output_dir = Some(output.clone());
        }
        if let Some(count) = self.frames {
            config.frames = FrameSpec::Count { count };
        }
        if let (Some(duration_seconds), Some(fps)) = (self.duration, self.fps) {
            config.frames = FrameSpec::Timed {
                duration_seconds,
                fps,
            };
        }
        if !self.tracks.is_empty() {
            config.tracks = self.tracks.clone();
        }
        if let Some(dpi) = self.dpi {
            config.export.dpi = dpi;
        }
        if let Some(pixel_size) = self.pixel_size {
            config.export.pixel_size = pixel_size;
        }
        if let Some(scale) = self.scale {
            config.export.scale = scale;
        }
        if self.gif {
            config.gif.enabled = true;
        }
        if self.no_loop {
            config.gif.loop_infinite = false;
        }
        if let Some(delay) = self.delay_ms {
            config.gif.frame_delay_ms = Some(delay);
        }
    }
}

fn dpi_help() -> String {
    format!("Export dpi; presets are {RESOLUTION_BUCKETS:?}, values above 600 scale the size")
}

fn pixel_size_help() -> String {
    format!("Longest edge in pixels; presets are {PIXEL_SIZE_PRESETS:?}")
}
