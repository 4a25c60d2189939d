//! Core library for the Param Animator application.
//!
//! The crate sweeps numeric host parameters across a sequence of frames,
//! hands each frame to an external renderer, and assembles the rendered
//! stills into a looping GIF. Each module owns one stage of that pipeline;
//! the host model and the renderer themselves are supplied by the caller
//! through the traits in [`render`].

pub mod assembly;
pub mod config;
pub mod error;
pub mod export;
pub mod looping;
pub mod orchestrator;
pub mod render;
pub mod timeline;

pub use assembly::{
    FrameFiles, FrameImage, FrameSize, FrameSource, GifAssembler, GifContainer, GifSettings,
    InMemoryFrames,
};
pub use config::{AppConfig, FrameSpec, GifConfig};
pub use error::{AnimatorError, AssemblyError, PatchError, Result};
pub use export::{ExportSettings, ResolutionPreset, ResolvedSize};
pub use looping::patch_infinite_loop;
pub use orchestrator::{AnimationOrchestrator, AnimationRequest, GifSummary, RunReport};
pub use render::{FrameRenderer, FrameTarget, HostModel};
pub use timeline::{FrameCount, FrameValues, ParameterTimeline, ParameterTrack};
