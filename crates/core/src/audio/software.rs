use std::{cell::RefCell, rc::Rc};

use crate::{
    Analyser, AudioClip, AudioConfig, AudioGraph, BeatsVizError, ClockSource, PlaybackSource,
    Result, SampleClock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceState {
    Unstarted,
    Running,
    Finished,
}

#[derive(Debug)]
struct Voice {
    clip: AudioClip,
    /// Read cursor in clip frames.
    cursor: f64,
    state: VoiceState,
    connected: bool,
}

impl Voice {
    fn is_live(&self) -> bool {
        self.connected && self.state != VoiceState::Finished
    }
}

/// Audio graph rendered in software against a sample-counting clock.
///
/// Every call to [`SoftwareGraph::process`] plays the role of the device
/// pulling one block from the graph: live sources are mixed, the mix is fed
/// to the analyser, and the clock advances by exactly the rendered length.
#[derive(Debug)]
pub struct SoftwareGraph {
    clock: SampleClock,
    analyser: Analyser,
    analyser_connected: bool,
    voices: Vec<Rc<RefCell<Voice>>>,
}

impl SoftwareGraph {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        Ok(Self {
            clock: SampleClock::new(config.sample_rate),
            analyser: Analyser::new(config)?,
            analyser_connected: false,
            voices: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    pub fn is_analyser_connected(&self) -> bool {
        self.analyser_connected
    }

    /// Number of sources still connected and not yet finished.
    pub fn live_sources(&self) -> usize {
        self.voices
            .iter()
            .filter(|voice| voice.borrow().is_live())
            .count()
    }

    /// Renders `frames` output frames and returns what reached the sink.
    pub fn process(&mut self, frames: usize) -> Vec<f32> {
        let mut block = vec![0.0; frames];
        let output_rate = f64::from(self.clock.sample_rate());

        for voice in &self.voices {
            let mut guard = voice.borrow_mut();
            let voice = &mut *guard;
            if voice.state != VoiceState::Running || !voice.connected {
                continue;
            }
            let step = f64::from(voice.clip.sample_rate()) / output_rate;
            let samples = voice.clip.samples();
            for out in block.iter_mut() {
                match samples.get(voice.cursor as usize) {
                    Some(sample) => *out += sample,
                    None => {
                        voice.state = VoiceState::Finished;
                        break;
                    }
                }
                voice.cursor += step;
            }
        }

        self.voices.retain(|voice| voice.borrow().is_live());

        self.analyser.push_samples(&block);
        self.clock.advance_frames(frames as u64);

        if self.analyser_connected {
            block
        } else {
            vec![0.0; frames]
        }
    }

    /// Renders whole frames until the clock has advanced by about `seconds`.
    pub fn process_seconds(&mut self, seconds: f64) -> Vec<f32> {
        let frames = (seconds * f64::from(self.clock.sample_rate())).round().max(0.0) as usize;
        self.process(frames)
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }
}

impl AudioGraph for SoftwareGraph {
    type Clock = SampleClock;
    type Source = SoftwareSource;

    fn clock(&self) -> SampleClock {
        self.clock.clone()
    }

    fn create_source(&mut self, clip: &AudioClip) -> SoftwareSource {
        let voice = Rc::new(RefCell::new(Voice {
            clip: clip.clone(),
            cursor: 0.0,
            state: VoiceState::Unstarted,
            connected: true,
        }));
        self.voices.push(Rc::clone(&voice));
        SoftwareSource { voice }
    }

    fn connect_analyser(&mut self) {
        self.analyser_connected = true;
    }

    fn disconnect_analyser(&mut self) {
        if self.analyser_connected {
            self.analyser.reset();
        }
        self.analyser_connected = false;
    }

    fn analyser(&self) -> &Analyser {
        &self.analyser
    }

    fn analyser_mut(&mut self) -> &mut Analyser {
        &mut self.analyser
    }
}

/// Source handle minted by [`SoftwareGraph`].
#[derive(Debug)]
pub struct SoftwareSource {
    voice: Rc<RefCell<Voice>>,
}

impl SoftwareSource {
    /// Playback position within the clip, in seconds.
    pub fn position(&self) -> f64 {
        let voice = self.voice.borrow();
        voice.cursor / f64::from(voice.clip.sample_rate())
    }

    pub fn is_running(&self) -> bool {
        self.voice.borrow().state == VoiceState::Running
    }
}

impl PlaybackSource for SoftwareSource {
    fn start(&mut self, offset_seconds: f64) -> Result<()> {
        let mut voice = self.voice.borrow_mut();
        if voice.state != VoiceState::Unstarted {
            return Err(BeatsVizError::SourceReused);
        }
        voice.cursor = offset_seconds.max(0.0) * f64::from(voice.clip.sample_rate());
        voice.state = VoiceState::Running;
        Ok(())
    }

    fn stop(&mut self) {
        self.voice.borrow_mut().state = VoiceState::Finished;
    }

    fn disconnect(&mut self) {
        self.voice.borrow_mut().connected = false;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::NEUTRAL_SAMPLE;

    fn graph() -> SoftwareGraph {
        SoftwareGraph::new(&AudioConfig {
            sample_rate: 100,
            ..AudioConfig::default()
        })
        .unwrap()
    }

    fn ramp_clip() -> AudioClip {
        let samples: Vec<f32> = (0..100).map(|n| n as f32 / 100.0).collect();
        AudioClip::from_interleaved(&samples, 1, 100).unwrap()
    }

    #[test]
    fn clock_advances_with_rendered_frames() {
        let mut graph = graph();
        let clock = graph.clock();
        graph.process(50);
        assert_abs_diff_eq!(clock.now(), 0.5);
    }

    #[test]
    fn started_source_plays_from_offset() {
        let mut graph = graph();
        graph.connect_analyser();
        let clip = ramp_clip();
        let mut source = graph.create_source(&clip);
        source.start(0.5).unwrap();

        let block = graph.process(3);
        assert_abs_diff_eq!(block[0], 0.5);
        assert_abs_diff_eq!(block[2], 0.52);
        assert_abs_diff_eq!(source.position(), 0.53, epsilon = 1e-9);
    }

    #[test]
    fn sources_are_single_use() {
        let mut graph = graph();
        let mut source = graph.create_source(&ramp_clip());
        source.start(0.0).unwrap();
        source.stop();
        assert!(matches!(source.start(0.0), Err(BeatsVizError::SourceReused)));
    }

    #[test]
    fn disconnect_is_idempotent_and_releases_the_voice() {
        let mut graph = graph();
        let mut source = graph.create_source(&ramp_clip());
        source.start(0.0).unwrap();
        assert_eq!(graph.live_sources(), 1);
        source.disconnect();
        source.disconnect();
        graph.process(1);
        assert_eq!(graph.live_sources(), 0);
    }

    #[test]
    fn source_finishes_at_clip_end() {
        let mut graph = graph();
        let mut source = graph.create_source(&ramp_clip());
        source.start(0.9).unwrap();
        graph.process(20);
        assert!(!source.is_running());
        assert_eq!(graph.live_sources(), 0);
    }

    #[test]
    fn disconnecting_the_analyser_clears_its_window() {
        let mut graph = graph();
        graph.connect_analyser();
        let clip = AudioClip::from_interleaved(&[0.5; 400], 1, 100).unwrap();
        graph.create_source(&clip).start(0.0).unwrap();
        graph.process(300);

        graph.disconnect_analyser();
        graph.disconnect_analyser();
        let mut bytes = vec![0; 8];
        graph.analyser().byte_time_domain_data(&mut bytes);
        assert!(bytes.iter().all(|&b| b == NEUTRAL_SAMPLE));
    }

    #[test]
    fn analyser_sees_the_mix() {
        let mut graph = graph();
        let clip = AudioClip::from_interleaved(&[0.5; 400], 1, 100).unwrap();
        let mut source = graph.create_source(&clip);
        source.start(0.0).unwrap();
        graph.process(300);

        let mut bytes = vec![0; 8];
        graph.analyser().byte_time_domain_data(&mut bytes);
        assert!(bytes.iter().all(|&b| b == 192));
    }
}
