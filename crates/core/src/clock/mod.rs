//! Audio-hardware time base.
//!
//! The timeline never reads wall-clock time. It asks a [`ClockSource`] which,
//! for real output devices, is the device's sample counter. Sleeping or
//! throttled frame callbacks therefore cannot desynchronise visuals from the
//! audio that is actually being played.

use std::{cell::Cell, rc::Rc};

/// Monotonically increasing time in seconds, tied to audio playback.
pub trait ClockSource {
    fn now(&self) -> f64;
}

impl<C: ClockSource + ?Sized> ClockSource for Rc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<C: ClockSource + ?Sized> ClockSource for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Clock derived from the number of frames an output has consumed.
///
/// Clones share the same counter, so the graph that renders audio and the
/// timeline that reads the time observe one value.
#[derive(Debug, Clone)]
pub struct SampleClock {
    sample_rate: u32,
    frames: Rc<Cell<u64>>,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            frames: Rc::new(Cell::new(0)),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    /// Advances by `frames` rendered output frames.
    pub fn advance_frames(&self, frames: u64) {
        self.frames.set(self.frames.get().saturating_add(frames));
    }

    /// Advances by the frame count closest to `seconds`. Negative input is ignored.
    pub fn advance_seconds(&self, seconds: f64) {
        if seconds > 0.0 {
            let frames = (seconds * f64::from(self.sample_rate)).round() as u64;
            self.advance_frames(frames);
        }
    }
}

impl ClockSource for SampleClock {
    fn now(&self) -> f64 {
        self.frames.get() as f64 / f64::from(self.sample_rate)
    }
}
