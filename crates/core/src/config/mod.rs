use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BeatsVizError, Result};

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub visual: VisualConfig,
    pub render_loop: RenderLoopConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.visual.validate()?;
        self.render_loop.validate()
    }
}

/// Which byte buffer the sampler pulls from the analyser each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDomain {
    #[default]
    TimeDomain,
    Frequency,
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Analysis window size. The waveform uses `fft_size / 2` segments.
    pub fft_size: usize,
    pub analysis_domain: AnalysisDomain,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 256,
            analysis_domain: AnalysisDomain::TimeDomain,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(BeatsVizError::Config("sample_rate must be non-zero".into()));
        }
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(BeatsVizError::Config(format!(
                "fft_size must be a power of two in [{MIN_FFT_SIZE}, {MAX_FFT_SIZE}], got {}",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(BeatsVizError::Config(
                "smoothing_time_constant must lie in [0, 1]".into(),
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(BeatsVizError::Config(
                "min_decibels must be below max_decibels".into(),
            ));
        }
        Ok(())
    }
}

/// RGBA colour with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self(r, g, b, 255)
    }
}

/// Canvas size and the cosmetic parameters of the visualisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub width: u32,
    pub height: u32,
    pub ring_width: f32,
    pub waveform_line_width: f32,
    pub spin_degrees_per_second: f32,
    pub timer_font_size: f32,
    pub background: Rgba,
    pub base_ring: Rgba,
    pub accent: Rgba,
    pub text: Rgba,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 500,
            ring_width: 30.0,
            waveform_line_width: 2.0,
            spin_degrees_per_second: 10.0,
            timer_font_size: 30.0,
            background: Rgba::opaque(42, 42, 42),
            base_ring: Rgba::opaque(0, 0, 0),
            accent: Rgba::opaque(214, 168, 41),
            text: Rgba::opaque(255, 255, 255),
        }
    }
}

impl VisualConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BeatsVizError::Config("canvas size must be non-zero".into()));
        }
        Ok(())
    }
}

/// Display cadence of the render loop driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLoopConfig {
    pub fps: u32,
    /// Stop the transport once the final frame of the clip has been drawn.
    pub auto_stop_at_end: bool,
}

impl Default for RenderLoopConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            auto_stop_at_end: true,
        }
    }
}

impl RenderLoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fps == 0 {
            return Err(BeatsVizError::Config("fps must be non-zero".into()));
        }
        Ok(())
    }

    pub fn frame_seconds(&self) -> f64 {
        1.0 / f64::from(self.fps.max(1))
    }
}
