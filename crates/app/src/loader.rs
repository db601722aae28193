//! Clip loading from disk or over HTTP. MP3, FLAC, Ogg Vorbis and WAV are
//! probed and decoded with symphonia.

use std::{
    fs::File,
    io::{self, Cursor},
    path::Path,
    time::Duration,
};

use beats_visualiser_core::{AudioClip, BeatsVizError, ClipLoader, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};

const USER_AGENT: &str = concat!("beats-visualiser/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 60;

/// Loads any container/codec symphonia can probe. Locations starting with
/// `http://` or `https://` are fetched first; anything else is a filesystem
/// path.
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaClipLoader;

impl ClipLoader for MediaClipLoader {
    fn load(&self, location: &str) -> Result<AudioClip> {
        let source: Box<dyn MediaSource> = if is_remote(location) {
            Box::new(Cursor::new(fetch(location)?))
        } else {
            let file = File::open(Path::new(location))
                .map_err(|err| BeatsVizError::load(format!("opening {location}: {err}")))?;
            Box::new(file)
        };
        decode(source, extension_of(location))
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// File extension of a path or URL, ignoring any query or fragment.
fn extension_of(location: &str) -> Option<&str> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    Path::new(path).extension().and_then(|ext| ext.to_str())
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    tracing::debug!(url, "fetching clip");
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
        .build()
        .map_err(|err| BeatsVizError::load(format!("http client: {err}")))?;
    let response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|err| BeatsVizError::load(format!("fetching {url}: {err}")))?;
    let bytes = response
        .bytes()
        .map_err(|err| BeatsVizError::load(format!("reading {url}: {err}")))?;
    Ok(bytes.to_vec())
}

/// Decodes the first audio track to interleaved f32, then mixes down.
fn decode(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<AudioClip> {
    let mss = MediaSourceStream::new(source, MediaSourceStreamOptions::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| decode_error("probe", err))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| BeatsVizError::load("no audio track found"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| decode_error("decoder", err))?;

    let mut sample_rate = params.sample_rate;
    let mut channels = params.channels.map(|layout| layout.count() as u16);
    let mut samples = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(decode_error("read", err)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let capacity = decoded.capacity();
                sample_rate = Some(spec.rate);
                channels = Some(spec.channels.count() as u16);

                if buffer.as_ref().map_or(true, |buf| buf.capacity() < capacity) {
                    buffer = Some(SampleBuffer::new(capacity as u64, spec));
                }
                if let Some(buf) = buffer.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(SymphoniaError::DecodeError(reason)) => {
                tracing::warn!(reason, "skipping undecodable packet");
            }
            Err(err) => return Err(decode_error("decode", err)),
        }
    }

    if samples.is_empty() {
        return Err(BeatsVizError::load("clip contains no audio"));
    }
    let sample_rate = sample_rate.ok_or_else(|| BeatsVizError::load("unknown sample rate"))?;
    let channels = channels.ok_or_else(|| BeatsVizError::load("unknown channel layout"))?;
    tracing::debug!(
        codec = ?params.codec,
        sample_rate,
        channels,
        samples = samples.len(),
        "decoded clip"
    );
    AudioClip::from_interleaved(&samples, channels, sample_rate)
        .map_err(|err| BeatsVizError::load(err.to_string()))
}

fn decode_error(stage: &str, err: SymphoniaError) -> BeatsVizError {
    BeatsVizError::load(format!("{stage}: {err}"))
}
