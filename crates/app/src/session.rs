//! Headless host: loads a clip on a worker thread, follows a control script
//! and drives the render loop at a virtual display cadence.

use std::{
    path::PathBuf,
    sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError},
    thread,
    time::Duration,
};

use beats_visualiser_core::{
    AppConfig, AudioClip, BeatsVizError, ClipLoader, Player, PlaybackState, RenderLoop, Renderer,
    Result, SoftwareGraph,
};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{
    output::FrameSink,
    script::{Action, ControlScript},
};

/// Parameters of one `render` run.
#[derive(Debug)]
pub struct SessionOptions {
    pub location: String,
    pub script: ControlScript,
    pub max_seconds: Option<f64>,
    pub audio_out: Option<PathBuf>,
}

/// What a finished session did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub clip_duration: f64,
    pub rejected_cues: usize,
}

pub struct Session<'a> {
    config: &'a AppConfig,
    sink: &'a mut dyn FrameSink,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a AppConfig, sink: &'a mut dyn FrameSink) -> Self {
        Self { config, sink }
    }

    pub fn run<L>(self, loader: L, mut options: SessionOptions) -> Result<SessionSummary>
    where
        L: ClipLoader + Send + 'static,
    {
        let graph = SoftwareGraph::new(&self.config.audio)?;
        let mut player = Player::new(graph, self.config.audio.analysis_domain);
        let mut driver = RenderLoop::new(
            Renderer::new(self.config.visual.clone()),
            &self.config.render_loop,
        );

        player.begin_load()?;
        let pending = spawn_load(loader, options.location.clone());

        let outcome = self.drive(&mut player, &mut driver, pending, &mut options);

        // Every exit path releases the loop and the audio graph.
        driver.cancel();
        player.teardown();
        outcome
    }

    fn drive(
        self,
        player: &mut Player<SoftwareGraph>,
        driver: &mut RenderLoop,
        pending: Receiver<Result<AudioClip>>,
        options: &mut SessionOptions,
    ) -> Result<SessionSummary> {
        let frame_seconds = self.config.render_loop.frame_seconds();
        let sample_rate = self.config.audio.sample_rate;
        let frames_per_tick = (f64::from(sample_rate) * frame_seconds).round().max(1.0) as usize;
        let mut audio_out = options
            .audio_out
            .as_ref()
            .map(|path| {
                let spec = WavSpec {
                    channels: 1,
                    sample_rate,
                    bits_per_sample: 32,
                    sample_format: SampleFormat::Float,
                };
                WavWriter::create(path, spec)
                    .map_err(|err| BeatsVizError::msg(format!("audio output: {err}")))
            })
            .transpose()?;

        let mut pending = Some(pending);
        let mut ready_at: Option<u64> = None;
        let mut rejected_cues = 0;
        let mut tick: u64 = 0;

        loop {
            if let Some(receiver) = pending.as_ref() {
                let delivered = if tick == 0 {
                    match receiver.try_recv() {
                        Ok(outcome) => Some(outcome),
                        Err(TryRecvError::Empty) => None,
                        Err(TryRecvError::Disconnected) => Some(Err(loader_vanished())),
                    }
                } else {
                    match receiver.recv_timeout(Duration::from_secs_f64(frame_seconds)) {
                        Ok(outcome) => Some(outcome),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => Some(Err(loader_vanished())),
                    }
                };
                if let Some(outcome) = delivered {
                    pending = None;
                    player.finish_load(outcome)?;
                    ready_at = Some(tick);
                    tracing::info!(duration = player.duration(), "clip loaded");
                }
            }

            if let Some(ready_at) = ready_at {
                let script_time = (tick - ready_at) as f64 * frame_seconds;
                for cue in options.script.due(script_time) {
                    let applied = match cue.action {
                        Action::Play => player.play(),
                        Action::Pause => player.pause(),
                        Action::Stop => player.stop(),
                    };
                    if let Err(err) = applied {
                        rejected_cues += 1;
                        tracing::error!(action = %cue.action, at = cue.at, error = %err, "cue rejected");
                    }
                }
            }

            let Some(frame) = driver.tick(player)? else {
                break;
            };
            self.sink.write_frame(tick, &frame)?;
            tick += 1;

            let block = player.graph_mut().process(frames_per_tick);
            if let Some(writer) = audio_out.as_mut() {
                for sample in block {
                    writer
                        .write_sample(sample)
                        .map_err(|err| BeatsVizError::msg(format!("audio output: {err}")))?;
                }
            }

            let display_time = tick as f64 * frame_seconds;
            if options.max_seconds.is_some_and(|limit| display_time >= limit) {
                tracing::info!(display_time, "reached time limit");
                break;
            }
            // With auto-stop disabled the transport stays Playing past the end.
            if ready_at.is_some()
                && options.script.is_finished()
                && (player.state() != PlaybackState::Playing || player.reached_end())
            {
                break;
            }
        }

        if let Some(writer) = audio_out {
            writer
                .finalize()
                .map_err(|err| BeatsVizError::msg(format!("audio output: {err}")))?;
        }
        self.sink.finish()?;

        Ok(SessionSummary {
            frames: tick,
            clip_duration: player.duration(),
            rejected_cues,
        })
    }
}

fn spawn_load<L>(loader: L, location: String) -> Receiver<Result<AudioClip>>
where
    L: ClipLoader + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        tracing::info!(%location, "loading clip");
        // The session may already have gone away; nothing left to notify.
        let _ = sender.send(loader.load(&location));
    });
    receiver
}

fn loader_vanished() -> BeatsVizError {
    BeatsVizError::load("loader thread exited without a result")
}

#[cfg(test)]
mod tests {
    use super::*;
    use beats_visualiser_core::{AudioConfig, VisualizationFrame};

    struct ToneLoader {
        seconds: f64,
    }

    impl ClipLoader for ToneLoader {
        fn load(&self, _location: &str) -> Result<AudioClip> {
            let frames = (self.seconds * 4_000.0) as usize;
            let samples: Vec<f32> = (0..frames).map(|n| ((n % 40) as f32 / 20.0) - 1.0).collect();
            AudioClip::from_interleaved(&samples, 1, 4_000)
        }
    }

    struct FailingLoader;

    impl ClipLoader for FailingLoader {
        fn load(&self, location: &str) -> Result<AudioClip> {
            Err(BeatsVizError::load(format!("{location} unreachable")))
        }
    }

    #[derive(Default)]
    struct Collect {
        frames: Vec<VisualizationFrame>,
        finished: bool,
    }

    impl FrameSink for Collect {
        fn write_frame(&mut self, _index: u64, frame: &VisualizationFrame) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig {
            audio: AudioConfig {
                sample_rate: 4_000,
                ..AudioConfig::default()
            },
            ..AppConfig::default()
        };
        config.render_loop.fps = 20;
        config
    }

    fn options(script: &str) -> SessionOptions {
        SessionOptions {
            location: "memory://tone".into(),
            script: script.parse::<ControlScript>().unwrap(),
            max_seconds: Some(30.0),
            audio_out: None,
        }
    }

    #[test]
    fn plays_a_clip_through_to_the_end() {
        let config = config();
        let mut sink = Collect::default();
        let summary = Session::new(&config, &mut sink)
            .run(ToneLoader { seconds: 1.0 }, options("play@0"))
            .unwrap();

        assert_eq!(summary.rejected_cues, 0);
        assert_eq!(summary.clip_duration, 1.0);
        assert!(sink.finished);
        // The final frame shows the completed clip; the transport stops after it.
        let last = sink.frames.last().unwrap();
        assert_eq!(last.elapsed_seconds, 1.0);
        assert!(sink.frames.iter().all(|frame| frame.elapsed_seconds <= 1.0));
    }

    #[test]
    fn ends_at_the_clip_end_without_auto_stop() {
        let mut config = config();
        config.render_loop.auto_stop_at_end = false;
        let mut sink = Collect::default();
        let mut opts = options("play@0");
        opts.max_seconds = None;
        let summary = Session::new(&config, &mut sink)
            .run(ToneLoader { seconds: 1.0 }, opts)
            .unwrap();

        assert!(sink.finished);
        assert!(summary.frames < 100);
        assert_eq!(sink.frames.last().unwrap().elapsed_seconds, 1.0);
    }

    #[test]
    fn counts_rejected_cues_without_aborting() {
        let config = config();
        let mut sink = Collect::default();
        let summary = Session::new(&config, &mut sink)
            .run(ToneLoader { seconds: 2.0 }, options("pause@0,play@0.1,stop@0.5"))
            .unwrap();
        assert_eq!(summary.rejected_cues, 1);
    }

    #[test]
    fn load_failure_ends_the_session() {
        let config = config();
        let mut sink = Collect::default();
        let err = Session::new(&config, &mut sink)
            .run(FailingLoader, options("play@0"))
            .unwrap_err();
        assert!(matches!(err, BeatsVizError::LoadFailure(_)));
    }

    #[test]
    fn writes_the_rendered_audio() {
        let config = config();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.wav");
        let mut sink = Collect::default();
        let mut opts = options("play@0,stop@0.5");
        opts.audio_out = Some(path.clone());
        Session::new(&config, &mut sink)
            .run(ToneLoader { seconds: 2.0 }, opts)
            .unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 4_000);
        assert!(reader.len() > 0);
    }
}
