use std::path::{Path, PathBuf};

use beats_visualiser_core::{AppConfig, ClipLoader};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod loader;
mod output;
mod script;
mod session;

use loader::MediaClipLoader;
use output::{open_sink, FrameFormat};
use script::ControlScript;
use session::{Session, SessionOptions};

fn main() -> beats_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render {
            source,
            out,
            format,
            script,
            max_seconds,
            audio_out,
        } => run_render(
            &config,
            source,
            &out,
            format,
            script,
            max_seconds,
            audio_out,
        ),
        Commands::Inspect { source } => run_inspect(&source),
        Commands::Config => {
            println!("{}", config.to_json_pretty()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> beats_visualiser_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_render(
    config: &AppConfig,
    source: String,
    out: &Path,
    format: FrameFormat,
    script: ControlScript,
    max_seconds: Option<f64>,
    audio_out: Option<PathBuf>,
) -> beats_visualiser_core::Result<()> {
    tracing::info!(%source, ?out, ?format, "starting render session");

    let mut sink = open_sink(format, out)?;
    let options = SessionOptions {
        location: source,
        script,
        max_seconds,
        audio_out,
    };
    let summary = Session::new(config, sink.as_mut()).run(MediaClipLoader, options)?;

    tracing::info!(
        frames = summary.frames,
        clip_duration = summary.clip_duration,
        rejected_cues = summary.rejected_cues,
        "render session finished"
    );
    Ok(())
}

fn run_inspect(source: &str) -> beats_visualiser_core::Result<()> {
    let clip = MediaClipLoader.load(source)?;
    println!("source:      {source}");
    println!("duration:    {:.3} s", clip.duration());
    println!("sample rate: {} Hz", clip.sample_rate());
    println!("channels:    {}", clip.channels());
    println!("frames:      {}", clip.frames());
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive circular waveform renderer", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults are used for anything it omits.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a clip through the render loop and write every frame.
    Render {
        /// Audio file path (MP3, FLAC, Ogg Vorbis, WAV) or http(s) URL.
        source: String,
        /// Output directory (svg) or file (jsonl).
        #[arg(short, long, default_value = "frames")]
        out: PathBuf,
        #[arg(short, long, value_enum, default_value_t = FrameFormat::Svg)]
        format: FrameFormat,
        /// Transport cues, seconds after the clip is ready.
        #[arg(short, long, default_value = "play@0")]
        script: ControlScript,
        /// Stop after this much display time.
        #[arg(long)]
        max_seconds: Option<f64>,
        /// Also write the mixed output to a WAV file.
        #[arg(long)]
        audio_out: Option<PathBuf>,
    },
    /// Print duration and format of a clip.
    Inspect {
        /// Audio file path (MP3, FLAC, Ogg Vorbis, WAV) or http(s) URL.
        source: String,
    },
    /// Print the effective configuration as JSON.
    Config,
}
