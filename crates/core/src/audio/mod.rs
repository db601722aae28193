//! Contracts for the audio collaborators the player depends on: decoded
//! clips, the clip loader, and the audio graph host.

mod software;

use std::sync::Arc;

use crate::{Analyser, BeatsVizError, ClockSource, Result};

pub use software::{SoftwareGraph, SoftwareSource};

/// Decoded audio, mixed down to mono. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct AudioClip {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioClip {
    /// Builds a clip from interleaved frames, averaging the channels.
    pub fn from_interleaved(interleaved: &[f32], channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(BeatsVizError::InvalidInput("clip needs at least one channel"));
        }
        if sample_rate == 0 {
            return Err(BeatsVizError::InvalidInput("clip sample rate must be non-zero"));
        }

        let width = usize::from(channels);
        let gain = 1.0 / f32::from(channels);
        let samples: Arc<[f32]> = interleaved
            .chunks_exact(width)
            .map(|frame| frame.iter().sum::<f32>() * gain)
            .collect();

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the source material before the mono mixdown.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Sample at `seconds` into the clip, or `None` past the end.
    pub fn sample_at(&self, seconds: f64) -> Option<f32> {
        if seconds < 0.0 {
            return None;
        }
        let index = (seconds * f64::from(self.sample_rate)) as usize;
        self.samples.get(index).copied()
    }
}

/// Fetches and decodes a clip. Implementations may block; hosts run them off
/// the render loop and hand the result back to the player.
pub trait ClipLoader {
    fn load(&self, location: &str) -> Result<AudioClip>;
}

/// Single-use binding of a clip to the output graph.
///
/// A source can be started once. Stopping and disconnecting are idempotent,
/// so teardown paths may run more than once.
pub trait PlaybackSource {
    fn start(&mut self, offset_seconds: f64) -> Result<()>;
    fn stop(&mut self);
    fn disconnect(&mut self);
}

/// Capability set the player needs from the audio host.
pub trait AudioGraph {
    type Clock: ClockSource + Clone;
    type Source: PlaybackSource;

    /// Handle to the hardware clock.
    fn clock(&self) -> Self::Clock;

    /// Mints a fresh, unstarted source bound to `clip` and routed into the
    /// analyser.
    fn create_source(&mut self, clip: &AudioClip) -> Self::Source;

    /// Routes the analyser into the destination sink.
    fn connect_analyser(&mut self);

    /// Detaches the analyser. Idempotent.
    fn disconnect_analyser(&mut self);

    fn analyser(&self) -> &Analyser;

    fn analyser_mut(&mut self) -> &mut Analyser;
}
