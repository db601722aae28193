use crate::{AudioGraph, Player, RenderLoopConfig, Renderer, Result, VisualizationFrame};

/// Token for the next scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(u64);

/// Single-threaded frame loop: one refresh-render-reschedule cycle per
/// display frame.
///
/// Once cancelled the loop stays cancelled; further scheduling and ticks
/// are silent no-ops.
#[derive(Debug)]
pub struct RenderLoop {
    renderer: Renderer,
    auto_stop_at_end: bool,
    pending: Option<FrameHandle>,
    next_handle: u64,
    cancelled: bool,
    frames_rendered: u64,
}

impl RenderLoop {
    /// Creates a loop with its first frame already scheduled.
    pub fn new(renderer: Renderer, config: &RenderLoopConfig) -> Self {
        let mut driver = Self {
            renderer,
            auto_stop_at_end: config.auto_stop_at_end,
            pending: None,
            next_handle: 0,
            cancelled: false,
            frames_rendered: 0,
        };
        driver.schedule();
        driver
    }

    /// Requests the next frame. Returns `None` after cancellation.
    pub fn schedule(&mut self) -> Option<FrameHandle> {
        if self.cancelled {
            return None;
        }
        if self.pending.is_none() {
            self.next_handle += 1;
            self.pending = Some(FrameHandle(self.next_handle));
        }
        self.pending
    }

    /// Releases the pending frame handle. Idempotent.
    pub fn cancel(&mut self) {
        if !self.cancelled {
            tracing::debug!(frames = self.frames_rendered, "render loop cancelled");
        }
        self.cancelled = true;
        self.pending = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Runs the scheduled frame, if any: refreshes the player, renders, stops
    /// the transport once the clip has played out, and reschedules.
    pub fn tick<G: AudioGraph>(&mut self, player: &mut Player<G>) -> Result<Option<VisualizationFrame>> {
        if self.pending.take().is_none() {
            return Ok(None);
        }

        player.tick()?;
        let frame = self.renderer.render(&player.frame_input());
        self.frames_rendered += 1;

        if self.auto_stop_at_end && player.reached_end() {
            tracing::debug!(duration = player.duration(), "clip played out");
            player.stop()?;
        }

        self.schedule();
        Ok(Some(frame))
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new(Renderer::default(), &RenderLoopConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        progress_fraction, AnalysisDomain, AudioClip, AudioConfig, DrawCommand, PlaybackState,
        SoftwareGraph,
    };

    const RATE: u32 = 1_000;

    fn loaded_player(seconds: usize) -> Player<SoftwareGraph> {
        let graph = SoftwareGraph::new(&AudioConfig {
            sample_rate: RATE,
            ..AudioConfig::default()
        })
        .unwrap();
        let mut player = Player::new(graph, AnalysisDomain::TimeDomain);
        player.begin_load().unwrap();
        let clip = AudioClip::from_interleaved(&vec![0.25; seconds * RATE as usize], 1, RATE).unwrap();
        player.finish_load(Ok(clip)).unwrap();
        player
    }

    fn progress(frame: &VisualizationFrame) -> f64 {
        match frame.commands[2] {
            DrawCommand::StrokeArc {
                start_angle,
                end_angle,
                ..
            } => (end_angle - start_angle) / std::f64::consts::TAU,
            _ => panic!("expected progress arc"),
        }
    }

    #[test]
    fn renders_once_per_scheduled_frame() {
        let mut driver = RenderLoop::default();
        let mut player = loaded_player(2);
        assert!(driver.tick(&mut player).unwrap().is_some());
        assert!(driver.is_scheduled());
        assert!(driver.tick(&mut player).unwrap().is_some());
        assert_eq!(driver.frames_rendered(), 2);
    }

    #[test]
    fn cancelled_loop_never_reschedules() {
        let mut driver = RenderLoop::default();
        let mut player = loaded_player(2);
        driver.cancel();
        driver.cancel();
        assert_eq!(driver.schedule(), None);
        assert!(driver.tick(&mut player).unwrap().is_none());
        assert_eq!(driver.frames_rendered(), 0);
    }

    #[test]
    fn final_frame_is_full_then_transport_stops() {
        let mut driver = RenderLoop::default();
        let mut player = loaded_player(1);
        player.play().unwrap();
        player.graph_mut().process_seconds(1.2);

        let frame = driver.tick(&mut player).unwrap().unwrap();
        assert!((progress(&frame) - 1.0).abs() < 1e-12);
        assert_eq!(player.state(), PlaybackState::Ready);
        assert!(!player.has_source());

        let next = driver.tick(&mut player).unwrap().unwrap();
        assert_eq!(progress(&next), 0.0);
    }

    #[test]
    fn paused_frames_are_frozen() {
        let mut driver = RenderLoop::default();
        let mut player = loaded_player(10);
        player.play().unwrap();
        player.graph_mut().process_seconds(2.5);
        driver.tick(&mut player).unwrap();
        player.pause().unwrap();

        player.graph_mut().process_seconds(1.0);
        let first = driver.tick(&mut player).unwrap().unwrap();
        player.graph_mut().process_seconds(1.0);
        let second = driver.tick(&mut player).unwrap().unwrap();
        assert_eq!(first, second);
        assert!((progress(&first) - progress_fraction(2.5, 10.0)).abs() < 1e-9);
    }
}
