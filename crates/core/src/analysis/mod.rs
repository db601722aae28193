use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AudioConfig, BeatsVizError, Result};

/// Byte value of a zero-amplitude sample in the time-domain buffer.
pub const NEUTRAL_SAMPLE: u8 = 128;

/// Analysis stage tapped between the playback sources and the output.
///
/// Keeps the most recent `fft_size` output samples and exposes them the way
/// a browser analyser node does: as an unsigned-byte waveform, or as a
/// smoothed, decibel-scaled byte spectrum with `fft_size / 2` bins.
pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    history: Vec<f32>,
    smoothed: Vec<f32>,
    fft: FftResources,
}

impl Analyser {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        config.validate()?;
        let fft_size = config.fft_size;
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(fft_size);
        let fft = FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            window: blackman_window(fft_size),
            plan,
        };

        Ok(Self {
            fft_size,
            smoothing: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            history: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            fft,
        })
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forgets all audio seen so far; the waveform reads flat afterwards.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
    }

    /// Appends freshly rendered output samples to the analysis window.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let len = self.history.len();
        if samples.len() >= len {
            self.history
                .copy_from_slice(&samples[samples.len() - len..]);
        } else if !samples.is_empty() {
            self.history.rotate_left(samples.len());
            self.history[len - samples.len()..].copy_from_slice(samples);
        }
    }

    /// Fills `out` with the latest waveform as bytes centred on 128.
    pub fn byte_time_domain_data(&self, out: &mut [u8]) {
        for (byte, sample) in out.iter_mut().zip(&self.history) {
            *byte = (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8;
        }
    }

    /// Fills `out` with the smoothed spectrum mapped from
    /// `[min_decibels, max_decibels]` onto `[0, 255]`.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) -> Result<()> {
        self.update_spectrum()?;
        let range = self.max_decibels - self.min_decibels;
        for (byte, magnitude) in out.iter_mut().zip(&self.smoothed) {
            let db = if *magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - self.min_decibels) / range;
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
        Ok(())
    }

    fn update_spectrum(&mut self) -> Result<()> {
        let fft = &mut self.fft;
        for ((slot, sample), weight) in fft.input.iter_mut().zip(&self.history).zip(&fft.window) {
            *slot = sample * weight;
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)
            .map_err(|err| BeatsVizError::msg(format!("spectrum analysis failed: {err}")))?;

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&fft.spectrum) {
            let magnitude = bin.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }
        Ok(())
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
    window: Vec<f32>,
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

fn blackman_window(len: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    (0..len)
        .map(|index| {
            let x = index as f32 / len as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}
