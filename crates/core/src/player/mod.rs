use crate::{
    AnalysisDomain, AudioClip, AudioGraph, BeatsVizError, ControlState, FrameInput,
    FrequencySampler, PlaybackSource, PlaybackState, Result, Timeline, Transition,
};

/// Composition root of the playback core.
///
/// Owns the timeline, the loaded clip, the single playback-source slot and
/// the sampler. Sources are minted by [`Player::play`] and retired by
/// [`Player::pause`] and [`Player::stop`]; no source outlives its play
/// segment. All methods are meant to be called from the render loop's
/// thread of control.
pub struct Player<G: AudioGraph> {
    graph: G,
    timeline: Timeline<G::Clock>,
    clip: Option<AudioClip>,
    source: Option<G::Source>,
    sampler: FrequencySampler,
    track_time: f64,
    last_error: Option<String>,
}

impl<G: AudioGraph> Player<G> {
    pub fn new(graph: G, domain: AnalysisDomain) -> Self {
        let timeline = Timeline::new(graph.clock());
        let sampler = FrequencySampler::for_analyser(graph.analyser(), domain);
        Self {
            graph,
            timeline,
            clip: None,
            source: None,
            sampler,
            track_time: 0.0,
            last_error: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.timeline.state()
    }

    pub fn controls(&self) -> ControlState {
        self.state().controls()
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    /// Clip length in seconds, 0 before a clip is loaded.
    pub fn duration(&self) -> f64 {
        self.clip.as_ref().map_or(0.0, AudioClip::duration)
    }

    /// Live timeline position.
    pub fn elapsed_seconds(&self) -> f64 {
        self.timeline.elapsed_seconds()
    }

    /// Position sampled at the last tick or transition.
    pub fn track_time(&self) -> f64 {
        self.track_time
    }

    pub fn sampler(&self) -> &FrequencySampler {
        &self.sampler
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Message of the most recent load failure, if the current clip failed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn begin_load(&mut self) -> Result<()> {
        self.timeline.begin_load()?;
        self.last_error = None;
        self.track_time = 0.0;
        Ok(())
    }

    /// Applies the outcome of an asynchronous load. A failure leaves the
    /// player idle and is returned to the caller as [`BeatsVizError::LoadFailure`].
    pub fn finish_load(&mut self, outcome: Result<AudioClip>) -> Result<()> {
        match outcome {
            Ok(clip) => {
                self.timeline.finish_load()?;
                tracing::debug!(
                    duration = clip.duration(),
                    sample_rate = clip.sample_rate(),
                    "clip ready"
                );
                self.clip = Some(clip);
                self.track_time = 0.0;
                Ok(())
            }
            Err(err) => {
                self.timeline.fail_load()?;
                self.release_audio();
                let err = match err {
                    BeatsVizError::LoadFailure(reason) => BeatsVizError::LoadFailure(reason),
                    other => BeatsVizError::LoadFailure(other.to_string()),
                };
                tracing::warn!(error = %err, "clip load failed");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Starts or resumes playback with a freshly minted source.
    pub fn play(&mut self) -> Result<()> {
        let Some(clip) = self.clip.as_ref() else {
            return Err(BeatsVizError::InvalidTransition {
                state: self.state(),
                action: "play",
            });
        };
        if !matches!(self.state(), PlaybackState::Ready | PlaybackState::Paused) {
            self.timeline.play()?;
            return Ok(());
        }

        // The timeline only commits once the source is actually running.
        let offset = self.timeline.start_offset();
        let mut source = self.graph.create_source(clip);
        if let Err(err) = source.start(offset) {
            source.disconnect();
            tracing::warn!(offset, error = %err, "playback source failed to start");
            return Err(err);
        }
        match self.timeline.play() {
            Ok(Transition::Started { offset }) => {
                tracing::debug!(offset, "minted playback source");
                self.graph.connect_analyser();
                self.sampler.attach();
                self.source = Some(source);
                self.track_time = offset;
                Ok(())
            }
            outcome => {
                source.stop();
                source.disconnect();
                outcome.map(drop)
            }
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        if let Transition::Paused { elapsed } = self.timeline.pause()? {
            self.retire_source();
            self.track_time = elapsed;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.timeline.stop()?;
        self.retire_source();
        self.sampler.detach();
        self.sampler.reset();
        self.track_time = 0.0;
        Ok(())
    }

    /// One render-loop refresh: while playing, pulls a new buffer and
    /// re-reads the timeline. Returns the position to draw.
    pub fn tick(&mut self) -> Result<f64> {
        if self.state() == PlaybackState::Playing {
            self.sampler.refresh(self.graph.analyser_mut())?;
            self.track_time = self.timeline.elapsed_seconds();
        }
        Ok(self.track_time)
    }

    /// True once a playing clip has run to (or past) its end.
    pub fn reached_end(&self) -> bool {
        let duration = self.duration();
        self.state() == PlaybackState::Playing && duration > 0.0 && self.track_time >= duration
    }

    /// Renderer input for the current tick, with elapsed time clamped to the clip.
    pub fn frame_input(&self) -> FrameInput<'_> {
        let duration = self.duration();
        let elapsed = if duration > 0.0 {
            self.track_time.clamp(0.0, duration)
        } else {
            self.track_time.max(0.0)
        };
        FrameInput {
            samples: self.sampler.sample(),
            elapsed_seconds: elapsed,
            duration_seconds: duration,
            segment_count: self.sampler.segment_count(),
        }
    }

    /// Releases the playback source and the analyser. Safe to call any
    /// number of times; also runs on drop.
    pub fn teardown(&mut self) {
        self.release_audio();
    }

    fn retire_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
            source.disconnect();
            tracing::debug!("retired playback source");
        }
    }

    fn release_audio(&mut self) {
        self.retire_source();
        self.graph.disconnect_analyser();
        self.sampler.detach();
    }
}

impl<G: AudioGraph> Drop for Player<G> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<G: AudioGraph> std::fmt::Debug for Player<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.state())
            .field("duration", &self.duration())
            .field("track_time", &self.track_time)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        Analyser, AudioConfig, SampleClock, SoftwareGraph, SoftwareSource, DEFAULT_SEGMENT_COUNT,
        NEUTRAL_SAMPLE,
    };

    const RATE: u32 = 1_000;

    fn player_graph() -> SoftwareGraph {
        SoftwareGraph::new(&AudioConfig {
            sample_rate: RATE,
            ..AudioConfig::default()
        })
        .unwrap()
    }

    fn player() -> Player<SoftwareGraph> {
        Player::new(player_graph(), AnalysisDomain::TimeDomain)
    }

    fn clip(seconds: usize, level: f32) -> AudioClip {
        AudioClip::from_interleaved(&vec![level; seconds * RATE as usize], 1, RATE).unwrap()
    }

    fn loaded_player() -> Player<SoftwareGraph> {
        let mut player = player();
        player.begin_load().unwrap();
        player.finish_load(Ok(clip(10, 0.5))).unwrap();
        player
    }

    #[test]
    fn idle_player_renders_flat_default_geometry() {
        let mut player = player();
        assert_eq!(player.tick().unwrap(), 0.0);
        let input = player.frame_input();
        assert_eq!(input.segment_count, DEFAULT_SEGMENT_COUNT);
        assert!(input.samples.iter().all(|&b| b == NEUTRAL_SAMPLE));
        assert_eq!(input.duration_seconds, 0.0);
        assert!(player.play().unwrap_err().is_invalid_transition());
    }

    #[test]
    fn load_failure_is_reported_and_leaves_player_idle() {
        let mut player = player();
        player.begin_load().unwrap();
        assert_eq!(player.controls(), ControlState::default());
        let err = player
            .finish_load(Err(BeatsVizError::msg("404 not found")))
            .unwrap_err();
        assert!(matches!(err, BeatsVizError::LoadFailure(_)));
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(player.last_error().unwrap().contains("404"));
    }

    #[test]
    fn play_mints_a_source_and_attaches_the_analyser() {
        let mut player = loaded_player();
        player.play().unwrap();
        assert!(player.has_source());
        assert!(player.graph().is_analyser_connected());

        player.graph_mut().process_seconds(0.5);
        player.tick().unwrap();
        assert_abs_diff_eq!(player.track_time(), 0.5, epsilon = 1e-9);
        assert_eq!(player.frame_input().segment_count, 128);
        assert!(player.sampler().sample().iter().all(|&b| b == 192));
    }

    #[test]
    fn pause_retires_the_source_and_resume_mints_a_new_one() {
        let mut player = loaded_player();
        player.play().unwrap();
        player.graph_mut().process_seconds(1.0);
        player.pause().unwrap();
        assert!(!player.has_source());
        assert_eq!(player.graph().live_sources(), 0);

        player.graph_mut().process_seconds(5.0);
        player.tick().unwrap();
        assert_abs_diff_eq!(player.track_time(), 1.0, epsilon = 1e-9);

        player.play().unwrap();
        assert_eq!(player.graph().live_sources(), 1);
        player.graph_mut().process_seconds(2.0);
        player.tick().unwrap();
        assert_abs_diff_eq!(player.track_time(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn stop_rewinds_and_returns_to_ready() {
        let mut player = loaded_player();
        player.play().unwrap();
        player.graph_mut().process_seconds(4.0);
        player.stop().unwrap();

        assert_eq!(player.state(), PlaybackState::Ready);
        assert_eq!(player.elapsed_seconds(), 0.0);
        assert_eq!(player.tick().unwrap(), 0.0);
        assert_eq!(player.frame_input().segment_count, DEFAULT_SEGMENT_COUNT);
        assert!(player.controls().play);
    }

    struct RefusingGraph(SoftwareGraph);

    struct RefusingSource(SoftwareSource);

    impl PlaybackSource for RefusingSource {
        fn start(&mut self, _offset_seconds: f64) -> Result<()> {
            Err(BeatsVizError::msg("output device unavailable"))
        }

        fn stop(&mut self) {
            self.0.stop();
        }

        fn disconnect(&mut self) {
            self.0.disconnect();
        }
    }

    impl AudioGraph for RefusingGraph {
        type Clock = SampleClock;
        type Source = RefusingSource;

        fn clock(&self) -> SampleClock {
            self.0.clock()
        }

        fn create_source(&mut self, clip: &AudioClip) -> RefusingSource {
            RefusingSource(self.0.create_source(clip))
        }

        fn connect_analyser(&mut self) {
            self.0.connect_analyser();
        }

        fn disconnect_analyser(&mut self) {
            self.0.disconnect_analyser();
        }

        fn analyser(&self) -> &Analyser {
            self.0.analyser()
        }

        fn analyser_mut(&mut self) -> &mut Analyser {
            self.0.analyser_mut()
        }
    }

    #[test]
    fn failed_source_start_leaves_the_transport_ready() {
        let mut player = Player::new(RefusingGraph(player_graph()), AnalysisDomain::TimeDomain);
        player.begin_load().unwrap();
        player.finish_load(Ok(clip(10, 0.5))).unwrap();

        assert!(player.play().is_err());
        assert_eq!(player.state(), PlaybackState::Ready);
        assert!(!player.has_source());
        assert!(!player.graph().0.is_analyser_connected());
        assert_eq!(player.graph().0.live_sources(), 0);

        player.graph_mut().0.process_seconds(2.0);
        assert_eq!(player.elapsed_seconds(), 0.0);
    }

    #[test]
    fn rejected_transition_keeps_the_source() {
        let mut player = loaded_player();
        player.play().unwrap();
        assert!(player.play().unwrap_err().is_invalid_transition());
        assert!(player.has_source());
        assert_eq!(player.graph().live_sources(), 1);
    }

    #[test]
    fn detects_end_and_clamps_elapsed() {
        let mut player = loaded_player();
        player.play().unwrap();
        player.graph_mut().process_seconds(10.5);
        player.tick().unwrap();
        assert!(player.reached_end());
        assert_eq!(player.frame_input().elapsed_seconds, 10.0);
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut player = loaded_player();
        player.play().unwrap();
        player.teardown();
        player.teardown();
        assert!(!player.has_source());
        assert!(!player.graph().is_analyser_connected());
        assert_eq!(player.graph().live_sources(), 0);
    }
}
