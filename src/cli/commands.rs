//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::{debug, info};

use crate::cli::{ProcessArgs, ToneArgs};
use crate::engine::{Stream, StreamConfig};
use crate::error::{EngineError, Result};

/// Counts reported after processing a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSummary {
    /// Frames read from the input file
    pub frames_in: usize,
    /// Frames written to the output file
    pub frames_out: usize,
}

/// Build the stream configuration for a file: preset, then file format,
/// then command-line overrides.
pub fn build_config(args: &ProcessArgs, sample_rate: u32, channels: usize) -> Result<StreamConfig> {
    let mut config = match &args.config {
        Some(path) => StreamConfig::from_json_file(path)?,
        None => StreamConfig::default(),
    };
    config.sample_rate = sample_rate;
    config.num_channels = channels;
    if let Some(speed) = args.speed {
        config.speed = speed;
    }
    if let Some(pitch) = args.pitch {
        config.pitch = pitch;
    }
    if let Some(rate) = args.rate {
        config.rate = rate;
    }
    if let Some(volume) = args.volume {
        config.volume = volume;
    }
    config.chord_pitch |= args.chord;
    config.quality |= args.quality;
    config.validate()?;
    Ok(config)
}

/// Move everything the stream has ready into the WAV writer
fn drain_into<W: std::io::Write + std::io::Seek>(
    stream: &mut Stream,
    writer: &mut WavWriter<W>,
    scratch: &mut [i16],
) -> Result<usize> {
    let mut written = 0;
    loop {
        let count = stream.read_samples(scratch);
        if count == 0 {
            return Ok(written);
        }
        for &sample in &scratch[..count] {
            writer.write_sample(sample)?;
        }
        written += count;
    }
}

/// Stream a 16-bit PCM WAV file through the engine into a new WAV file
///
/// # Errors
/// * `Wav` - If either file cannot be read or written
/// * `UnsupportedFormat` - If the input is not 16-bit integer PCM
/// * Any configuration error from the preset or flags
pub fn process_file(args: &ProcessArgs) -> Result<ProcessSummary> {
    info!(
        "Processing {} -> {}",
        args.input.display(),
        args.output.display()
    );

    let mut reader = WavReader::open(&args.input)?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(EngineError::UnsupportedFormat {
            format: format!("{}-bit {:?}", spec.bits_per_sample, spec.sample_format),
        });
    }

    let channels = spec.channels as usize;
    let config = build_config(args, spec.sample_rate, channels)?;
    debug!("Config: {:?}", config);
    let mut stream = Stream::with_config(config)?;

    let out_spec = WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&args.output, out_spec)?;

    let chunk_len = args.chunk_frames.max(1) * channels;
    let mut chunk = Vec::with_capacity(chunk_len);
    let mut scratch = vec![0i16; chunk_len.max(4096)];
    let mut samples_in = 0;
    let mut samples_out = 0;

    for sample in reader.samples::<i16>() {
        chunk.push(sample?);
        if chunk.len() == chunk_len {
            stream.write_samples(&chunk)?;
            samples_in += chunk.len();
            chunk.clear();
            samples_out += drain_into(&mut stream, &mut writer, &mut scratch)?;
        }
    }
    if !chunk.is_empty() {
        stream.write_samples(&chunk)?;
        samples_in += chunk.len();
    }

    stream.flush()?;
    samples_out += drain_into(&mut stream, &mut writer, &mut scratch)?;
    writer.finalize()?;
    stream.close();

    let summary = ProcessSummary {
        frames_in: samples_in / channels,
        frames_out: samples_out / channels,
    };
    info!(
        "Done: {} frames in, {} frames out",
        summary.frames_in, summary.frames_out
    );
    Ok(summary)
}

/// Write a sine tone to a 16-bit WAV file
pub fn generate_tone(args: &ToneArgs) -> Result<()> {
    info!(
        "Writing {:.1} Hz tone ({:.2}s) to {}",
        args.frequency,
        args.duration,
        args.output.display()
    );
    write_tone(
        &args.output,
        args.frequency,
        args.duration,
        args.sample_rate,
        args.channels,
    )
}

/// Write `duration` seconds of a half-scale sine at `frequency` Hz
pub fn write_tone(
    path: &Path,
    frequency: f32,
    duration: f32,
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    if sample_rate == 0 {
        return Err(EngineError::InvalidSampleRate(sample_rate));
    }
    if channels == 0 {
        return Err(EngineError::InvalidChannels(0));
    }
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let frames = (duration.max(0.0) * sample_rate as f32) as usize;
    for i in 0..frames {
        let t = i as f64 / sample_rate as f64;
        let value = (16384.0 * (2.0 * std::f64::consts::PI * frequency as f64 * t).sin()) as i16;
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(input: PathBuf, output: PathBuf) -> ProcessArgs {
        ProcessArgs {
            input,
            output,
            chunk_frames: 256,
            ..ProcessArgs::default()
        }
    }

    #[test]
    fn test_build_config_overrides() {
        let mut a = args(PathBuf::from("in.wav"), PathBuf::from("out.wav"));
        a.speed = Some(1.5);
        a.chord = true;
        let config = build_config(&a, 22050, 2).unwrap();
        assert_eq!(config.sample_rate, 22050);
        assert_eq!(config.num_channels, 2);
        assert_eq!(config.speed, 1.5);
        assert_eq!(config.pitch, 1.0);
        assert!(config.chord_pitch);
    }

    #[test]
    fn test_build_config_rejects_bad_flag() {
        let mut a = args(PathBuf::from("in.wav"), PathBuf::from("out.wav"));
        a.rate = Some(0.0);
        assert!(build_config(&a, 44100, 1).is_err());
    }

    #[test]
    fn test_build_config_preset_file() {
        let dir = tempfile::tempdir().unwrap();
        let preset = dir.path().join("preset.json");
        std::fs::write(&preset, r#"{ "pitch": 1.5, "volume": 0.5 }"#).unwrap();

        let mut a = args(PathBuf::from("in.wav"), PathBuf::from("out.wav"));
        a.config = Some(preset);
        a.volume = Some(0.8);
        let config = build_config(&a, 16000, 1).unwrap();
        assert_eq!(config.pitch, 1.5);
        assert_eq!(config.volume, 0.8);
    }

    #[test]
    fn test_process_rejects_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&input, spec).unwrap();
        writer.write_sample(0.5f32).unwrap();
        writer.finalize().unwrap();

        let err = process_file(&args(input, dir.path().join("out.wav"))).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn test_write_tone_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_tone(&path, 440.0, 0.5, 8000, 2).unwrap();
        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 4000);
        assert_eq!(reader.spec().channels, 2);
    }
}
