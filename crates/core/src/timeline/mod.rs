use serde::{Deserialize, Serialize};

use crate::{BeatsVizError, ClockSource, Result};

/// Transport state of the player. Exactly one is current at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
}

impl PlaybackState {
    /// Which transport controls a host should enable in this state.
    pub fn controls(self) -> ControlState {
        match self {
            Self::Idle | Self::Loading => ControlState::default(),
            Self::Ready => ControlState {
                play: true,
                ..ControlState::default()
            },
            Self::Playing => ControlState {
                play: false,
                pause: true,
                stop: true,
            },
            Self::Paused => ControlState {
                play: true,
                pause: false,
                stop: true,
            },
        }
    }
}

/// Enablement of the three transport affordances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub play: bool,
    pub pause: bool,
    pub stop: bool,
}

/// Side effect the owner of the playback source must carry out after an
/// accepted transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Mint a fresh source and start it this many seconds into the clip.
    Started { offset: f64 },
    /// Halt the current source; `elapsed` is the position it was halted at.
    Paused { elapsed: f64 },
    /// Halt, disconnect and discard the current source.
    Stopped,
}

/// Elapsed-time bookkeeping across play/pause/stop cycles.
///
/// `start_offset` accumulates the length of finished play segments and is
/// frozen while playing; `resumed_at` is the clock reading at the start of
/// the running segment and is `Some` exactly when the state is `Playing`.
#[derive(Debug)]
pub struct Timeline<C> {
    clock: C,
    start_offset: f64,
    resumed_at: Option<f64>,
    state: PlaybackState,
}

impl<C: ClockSource> Timeline<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            start_offset: 0.0,
            resumed_at: None,
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn start_offset(&self) -> f64 {
        self.start_offset
    }

    /// Current position within the clip. Never negative.
    pub fn elapsed_seconds(&self) -> f64 {
        match self.resumed_at {
            Some(resumed_at) => self.start_offset + (self.clock.now() - resumed_at).max(0.0),
            None => self.start_offset,
        }
    }

    /// Idle/Ready → Loading. A Ready timeline may load a replacement clip.
    pub fn begin_load(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Idle | PlaybackState::Ready => {
                self.start_offset = 0.0;
                self.enter(PlaybackState::Loading);
                Ok(())
            }
            state => self.reject(state, "load"),
        }
    }

    /// Loading → Ready.
    pub fn finish_load(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Loading => {
                self.start_offset = 0.0;
                self.enter(PlaybackState::Ready);
                Ok(())
            }
            state => self.reject(state, "finish loading"),
        }
    }

    /// Loading → Idle.
    pub fn fail_load(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Loading => {
                self.enter(PlaybackState::Idle);
                Ok(())
            }
            state => self.reject(state, "fail loading"),
        }
    }

    /// Ready/Paused → Playing.
    pub fn play(&mut self) -> Result<Transition> {
        match self.state {
            PlaybackState::Ready | PlaybackState::Paused => {
                self.resumed_at = Some(self.clock.now());
                self.enter(PlaybackState::Playing);
                Ok(Transition::Started {
                    offset: self.start_offset,
                })
            }
            state => self.reject(state, "play"),
        }
    }

    /// Playing → Paused, folding the running segment into `start_offset`.
    pub fn pause(&mut self) -> Result<Transition> {
        match (self.state, self.resumed_at) {
            (PlaybackState::Playing, Some(resumed_at)) => {
                self.start_offset += (self.clock.now() - resumed_at).max(0.0);
                self.resumed_at = None;
                self.enter(PlaybackState::Paused);
                Ok(Transition::Paused {
                    elapsed: self.start_offset,
                })
            }
            (state, _) => self.reject(state, "pause"),
        }
    }

    /// Playing/Paused → Ready, rewinding to zero.
    pub fn stop(&mut self) -> Result<Transition> {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => {
                self.start_offset = 0.0;
                self.resumed_at = None;
                self.enter(PlaybackState::Ready);
                Ok(Transition::Stopped)
            }
            state => self.reject(state, "stop"),
        }
    }

    fn enter(&mut self, next: PlaybackState) {
        tracing::debug!(from = ?self.state, to = ?next, offset = self.start_offset, "timeline transition");
        self.state = next;
    }

    fn reject<T>(&self, state: PlaybackState, action: &'static str) -> Result<T> {
        tracing::warn!(?state, action, "rejected transport transition");
        Err(BeatsVizError::InvalidTransition { state, action })
    }
}
