//! Stream Controller
//!
//! Owns the configuration and every pipeline stage. Audio pushed in runs
//! through, in order:
//!
//! 1. rate (resample; pitch and duration together)
//! 2. speed (time scale; duration only)
//! 3. pitch or chord (time scale + resample; pitch only)
//! 4. volume
//!
//! A stage whose ratio is exactly 1.0 is skipped outright, so a neutral
//! stream returns its input bit for bit.
//!
//! Calls on one stream must be serialized by the caller; nothing here blocks.

use log::{debug, trace, warn};

use crate::dsp::pitch_shift::{ChordShifter, PitchShifter};
use crate::dsp::resample::Resampler;
use crate::dsp::stage::{drain_stage, drive_stage, scaled_samples, Stage};
use crate::dsp::time_scale::TimeScaler;
use crate::dsp::volume::apply_volume;
use crate::engine::buffer::{encode_samples, SampleBuffer, BYTES_PER_SAMPLE};
use crate::engine::config::{
    validate_channels, validate_ratio, validate_sample_rate, validate_volume, StreamConfig,
};
use crate::error::Result;

/// Streaming speed, pitch and rate changer for interleaved 16-bit PCM
#[derive(Debug, Clone)]
pub struct Stream {
    config: StreamConfig,
    buffer: SampleBuffer,
    rate_stage: Resampler,
    speed_stage: TimeScaler,
    pitch_stage: PitchShifter,
    chord_stage: ChordShifter,
}

impl Stream {
    /// Create a stream with every effect neutral
    ///
    /// # Errors
    /// * `InvalidSampleRate` - If `sample_rate` is 0
    /// * `InvalidChannels` - If `num_channels` is 0
    pub fn new(sample_rate: u32, num_channels: usize) -> Result<Self> {
        Self::with_config(StreamConfig::new(sample_rate, num_channels))
    }

    /// Create a stream from a full configuration
    pub fn with_config(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        let sr = config.sample_rate;
        let ch = config.num_channels;
        let mut stream = Self {
            buffer: SampleBuffer::new(ch),
            rate_stage: Resampler::new(ch),
            speed_stage: TimeScaler::new(sr, ch, config.quality),
            pitch_stage: PitchShifter::new(sr, ch, config.quality),
            chord_stage: ChordShifter::new(sr, ch, config.quality),
            config,
        };
        stream.apply_ratios();
        debug!(
            "Stream created: {} Hz, {} channel(s), speed {}, pitch {}, rate {}",
            sr, ch, stream.config.speed, stream.config.pitch, stream.config.rate
        );
        Ok(stream)
    }

    /// Current configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    fn apply_ratios(&mut self) {
        self.rate_stage.set_step(self.config.rate as f64);
        self.speed_stage.set_speed(self.config.speed as f64);
        self.pitch_stage.set_pitch(self.config.pitch as f64);
        self.chord_stage.set_pitch(self.config.pitch as f64);
    }

    /// Rebuild every stage for the current format, dropping their state
    fn rebuild_stages(&mut self) {
        let sr = self.config.sample_rate;
        let ch = self.config.num_channels;
        let quality = self.config.quality;
        self.rate_stage = Resampler::new(ch);
        self.speed_stage = TimeScaler::new(sr, ch, quality);
        self.pitch_stage = PitchShifter::new(sr, ch, quality);
        self.chord_stage = ChordShifter::new(sr, ch, quality);
        self.apply_ratios();
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Change the sample rate
    ///
    /// Audio already in the pipeline is flushed out under the old rate first.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        if let Err(e) = validate_sample_rate(sample_rate) {
            warn!("Rejected sample rate {}: keeping {}", sample_rate, self.config.sample_rate);
            return Err(e);
        }
        if sample_rate == self.config.sample_rate {
            return Ok(());
        }
        self.drain()?;
        debug!("Sample rate {} -> {}", self.config.sample_rate, sample_rate);
        self.config.sample_rate = sample_rate;
        self.rebuild_stages();
        Ok(())
    }

    /// Channels per frame
    pub fn num_channels(&self) -> usize {
        self.config.num_channels
    }

    /// Change the channel count
    ///
    /// Audio already in the pipeline is flushed out in the old layout first.
    /// A partial frame still waiting for its remaining bytes is dropped.
    pub fn set_num_channels(&mut self, num_channels: usize) -> Result<()> {
        if let Err(e) = validate_channels(num_channels) {
            warn!("Rejected channel count {}: keeping {}", num_channels, self.config.num_channels);
            return Err(e);
        }
        if num_channels == self.config.num_channels {
            return Ok(());
        }
        self.drain()?;
        debug!("Channels {} -> {}", self.config.num_channels, num_channels);
        self.config.num_channels = num_channels;
        self.buffer.set_num_channels(num_channels);
        self.rebuild_stages();
        Ok(())
    }

    /// Pitch multiplier
    pub fn pitch(&self) -> f32 {
        self.config.pitch
    }

    /// Change pitch without changing duration
    pub fn set_pitch(&mut self, pitch: f32) -> Result<()> {
        self.check_ratio("pitch", pitch)?;
        self.config.pitch = pitch;
        self.pitch_stage.set_pitch(pitch as f64);
        self.chord_stage.set_pitch(pitch as f64);
        Ok(())
    }

    /// Speed multiplier
    pub fn speed(&self) -> f32 {
        self.config.speed
    }

    /// Change duration without changing pitch
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        self.check_ratio("speed", speed)?;
        self.config.speed = speed;
        self.speed_stage.set_speed(speed as f64);
        Ok(())
    }

    /// Playback rate multiplier
    pub fn rate(&self) -> f32 {
        self.config.rate
    }

    /// Change pitch and duration together, like playing a tape faster
    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.check_ratio("rate", rate)?;
        self.config.rate = rate;
        self.rate_stage.set_step(rate as f64);
        Ok(())
    }

    /// Output gain
    pub fn volume(&self) -> f32 {
        self.config.volume
    }

    /// Set the output gain; 0.0 is silence, above 1.0 clamps at full scale
    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        if let Err(e) = validate_volume(volume) {
            warn!("Rejected volume {}: keeping {}", volume, self.config.volume);
            return Err(e);
        }
        self.config.volume = volume;
        Ok(())
    }

    /// Whether chord mode is on
    pub fn chord_pitch(&self) -> bool {
        self.config.chord_pitch
    }

    /// Turn chord mode on or off; when on it replaces the single pitch shift
    pub fn set_chord_pitch(&mut self, chord_pitch: bool) {
        if chord_pitch != self.config.chord_pitch {
            debug!("Chord pitch {}", if chord_pitch { "on" } else { "off" });
        }
        self.config.chord_pitch = chord_pitch;
    }

    /// Whether the full-rate period search is on
    pub fn quality(&self) -> bool {
        self.config.quality
    }

    /// Trade speed for accuracy in period detection
    pub fn set_quality(&mut self, quality: bool) {
        self.config.quality = quality;
        self.speed_stage.set_quality(quality);
        self.pitch_stage.set_quality(quality);
        self.chord_stage.set_quality(quality);
    }

    fn check_ratio(&self, name: &'static str, value: f32) -> Result<()> {
        validate_ratio(name, value).map_err(|e| {
            warn!("Rejected {} {}: keeping previous value", name, value);
            e
        })
    }

    /// Most input frames a time-scale stage waits for before producing output
    pub fn max_required_frames(&self) -> usize {
        self.speed_stage.window_frames()
    }

    // ========================================================================
    // Audio In
    // ========================================================================

    /// Push raw little-endian 16-bit interleaved PCM
    ///
    /// Any byte count is accepted; a trailing partial frame is held until
    /// the rest of it arrives.
    ///
    /// # Returns
    /// `false` only when memory for the new audio could not be allocated.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> bool {
        match self.write_bytes(bytes) {
            Ok(()) => true,
            Err(e) => {
                warn!("put_bytes failed: {}", e);
                false
            }
        }
    }

    /// Push raw bytes, reporting allocation failure as an error
    ///
    /// # Errors
    /// * `OutOfMemory` - If staging or output space cannot be allocated
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.reserve_pipeline(self.buffer.samples_completed_by(bytes.len()))?;
        let samples = self.buffer.append(bytes)?;
        self.process(samples, false)
    }

    /// Reserve room in every active stage, and in the output queue, for
    /// `samples` new input samples
    fn reserve_pipeline(&mut self, samples: usize) -> Result<()> {
        if samples == 0 {
            return Ok(());
        }
        let rate = self.config.rate as f64;
        let speed = self.config.speed as f64;
        let mut next = samples;
        if rate != 1.0 {
            self.rate_stage.reserve(next)?;
            next = scaled_samples(next, 1.0 / rate);
        }
        if speed != 1.0 {
            self.speed_stage.reserve(next)?;
            next = scaled_samples(next, 1.0 / speed);
        }
        if self.config.chord_pitch {
            self.chord_stage.reserve(next)?;
        } else if self.config.pitch != 1.0 {
            self.pitch_stage.reserve(next)?;
        }
        self.buffer.reserve_output(next)
    }

    /// Push interleaved samples
    ///
    /// A half sample left by an earlier [`put_bytes`](Self::put_bytes) is
    /// dropped so `samples` start on a sample boundary.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<()> {
        self.buffer.discard_partial_sample();
        self.write_bytes(&encode_samples(samples))
    }

    fn process(&mut self, input: Vec<i16>, flushing: bool) -> Result<()> {
        let frames_in = input.len() / self.config.num_channels;
        let config = &self.config;
        let rate_active = config.rate != 1.0;
        let speed_active = config.speed != 1.0;
        let chord_active = config.chord_pitch;
        let pitch_active = !chord_active && config.pitch != 1.0;
        let volume = config.volume;

        let rated = drive_stage(&mut self.rate_stage, rate_active, input, flushing);
        let sped = drive_stage(&mut self.speed_stage, speed_active, rated, flushing);
        // Whichever of pitch and chord is off releases what it held first
        let mut shifted;
        if chord_active {
            shifted = drain_stage(&mut self.pitch_stage);
            shifted.extend(drive_stage(&mut self.chord_stage, true, sped, flushing));
        } else {
            shifted = drain_stage(&mut self.chord_stage);
            shifted.extend(drive_stage(&mut self.pitch_stage, pitch_active, sped, flushing));
        }

        apply_volume(&mut shifted, volume);

        trace!(
            "Processed {} frames in, {} frames out",
            frames_in,
            shifted.len() / self.config.num_channels
        );
        self.buffer.push_output(&shifted)
    }

    // ========================================================================
    // Audio Out
    // ========================================================================

    /// Copy up to `out.len()` bytes of processed audio into `out`
    ///
    /// # Returns
    /// Bytes written; 0 means nothing is ready yet.
    pub fn receive_bytes(&mut self, out: &mut [u8]) -> usize {
        self.buffer.take(out)
    }

    /// Copy up to `out.len()` processed samples into `out`
    ///
    /// The tail of a sample split by [`receive_bytes`](Self::receive_bytes)
    /// is dropped first.
    pub fn read_samples(&mut self, out: &mut [i16]) -> usize {
        self.buffer.take_samples(out)
    }

    /// Bytes of processed audio ready to be received
    pub fn available_bytes(&self) -> usize {
        self.buffer.available()
    }

    /// Whole samples of processed audio ready to be read
    pub fn samples_available(&self) -> usize {
        self.buffer.available() / BYTES_PER_SAMPLE
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Emit everything the buffered input can produce
    ///
    /// Periods held back as context are processed with whatever estimate is
    /// available. A partial frame waiting for its remaining bytes stays
    /// buffered. The stream is reusable afterwards.
    ///
    /// # Errors
    /// * `OutOfMemory` - If the output queue cannot grow
    pub fn flush(&mut self) -> Result<()> {
        debug!("Flushing stream");
        self.process(Vec::new(), true)
    }

    /// Flush and drop any partial frame, ahead of a format change
    fn drain(&mut self) -> Result<()> {
        self.flush()?;
        self.buffer.discard_residual();
        Ok(())
    }

    /// Release every buffer
    pub fn close(mut self) {
        debug!("Closing stream with {} bytes unread", self.buffer.available());
        self.buffer.clear();
    }
}

/// Run a whole buffer of interleaved samples through a fresh stream
///
/// # Example
/// ```
/// use sonance::{process_samples, StreamConfig};
///
/// let mut config = StreamConfig::new(16000, 1);
/// config.speed = 2.0;
/// let input: Vec<i16> = (0..16000)
///     .map(|i| ((i as f32 * 0.17).sin() * 8000.0) as i16)
///     .collect();
/// let output = process_samples(&config, &input).unwrap();
/// assert!((output.len() as i64 - 8000).abs() < 400);
/// ```
pub fn process_samples(config: &StreamConfig, samples: &[i16]) -> Result<Vec<i16>> {
    let mut stream = Stream::with_config(config.clone())?;
    stream.write_samples(samples)?;
    stream.flush()?;
    let mut output = vec![0i16; stream.samples_available()];
    let read = stream.read_samples(&mut output);
    output.truncate(read);
    Ok(output)
}
