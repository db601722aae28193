//! Scripted transport presses, e.g. `play@0,pause@3.5,play@5,stop@12`.
//! Times are seconds after the clip becomes ready.

use std::{fmt, str::FromStr};

use beats_visualiser_core::{BeatsVizError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play,
    Pause,
    Stop,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cue {
    pub at: f64,
    pub action: Action,
}

/// Cues ordered by time, consumed as the session clock passes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlScript {
    cues: Vec<Cue>,
    next: usize,
}

impl ControlScript {
    pub fn new(mut cues: Vec<Cue>) -> Self {
        cues.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self { cues, next: 0 }
    }

    /// Returns every cue due at or before `time` that has not fired yet.
    pub fn due(&mut self, time: f64) -> &[Cue] {
        let start = self.next;
        while self
            .cues
            .get(self.next)
            .is_some_and(|cue| cue.at <= time)
        {
            self.next += 1;
        }
        &self.cues[start..self.next]
    }

    pub fn is_finished(&self) -> bool {
        self.next >= self.cues.len()
    }
}

impl FromStr for ControlScript {
    type Err = BeatsVizError;

    fn from_str(raw: &str) -> Result<Self> {
        let cues = raw
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_cue)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(cues))
    }
}

fn parse_cue(entry: &str) -> Result<Cue> {
    let (name, at) = entry
        .split_once('@')
        .ok_or_else(|| BeatsVizError::msg(format!("cue `{entry}` is missing `@<seconds>`")))?;
    let action = match name.trim().to_ascii_lowercase().as_str() {
        "play" => Action::Play,
        "pause" => Action::Pause,
        "stop" => Action::Stop,
        other => return Err(BeatsVizError::msg(format!("unknown action `{other}`"))),
    };
    let at: f64 = at
        .trim()
        .parse()
        .map_err(|_| BeatsVizError::msg(format!("invalid time in cue `{entry}`")))?;
    if !at.is_finite() || at < 0.0 {
        return Err(BeatsVizError::msg(format!("cue `{entry}` must use a non-negative time")));
    }
    Ok(Cue { at, action })
}
