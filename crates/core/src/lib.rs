//! Core library for the Beats Visualiser.
//!
//! Two pieces carry the algorithmic weight: the [`Timeline`], which tracks
//! elapsed playback time against the audio hardware clock across
//! play/pause/stop, and the [`render`] module, which turns a sampled byte
//! buffer plus the timeline position into drawing commands. The remaining
//! modules wrap the audio host ([`audio`], [`analysis`], [`sampler`]), tie
//! everything together ([`Player`]) and drive it once per display frame
//! ([`RenderLoop`]).

pub mod analysis;
pub mod audio;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod player;
pub mod render;
pub mod sampler;
pub mod timeline;

pub use analysis::{Analyser, NEUTRAL_SAMPLE};
pub use audio::{AudioClip, AudioGraph, ClipLoader, PlaybackSource, SoftwareGraph, SoftwareSource};
pub use clock::{ClockSource, SampleClock};
pub use config::{AnalysisDomain, AppConfig, AudioConfig, RenderLoopConfig, Rgba, VisualConfig};
pub use driver::{FrameHandle, RenderLoop};
pub use error::{BeatsVizError, Result};
pub use player::Player;
pub use render::{
    format_timer, lerp, progress_fraction, render_frame, svg::to_svg, DrawCommand, FrameInput,
    Point, Renderer, VisualizationFrame,
};
pub use sampler::{FrequencySampler, DEFAULT_SEGMENT_COUNT};
pub use timeline::{ControlState, PlaybackState, Timeline, Transition};
