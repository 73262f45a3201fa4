//! Pitch Shifter
//!
//! A pitch shift by `p` is a time stretch to `p` times the duration followed
//! by a resample that reads `p` frames per output frame: the duration comes
//! back to where it started and the pitch ends up multiplied by `p`.
//!
//! The chord shifter runs one pitch shifter per interval of a major triad
//! and mixes them.

use log::trace;

use super::resample::Resampler;
use super::stage::{drive_stage, run_stage, scaled_samples, Stage};
use super::time_scale::TimeScaler;
use crate::error::Result;

/// Frequency ratios of the chord voices: root, major third, perfect fifth
pub const CHORD_INTERVALS: [f64; 3] = [1.0, 5.0 / 4.0, 3.0 / 2.0];

// ============================================================================
// Pitch Shifter
// ============================================================================

/// Duration-preserving pitch shifter
#[derive(Debug, Clone)]
pub struct PitchShifter {
    pitch: f64,
    scaler: TimeScaler,
    resampler: Resampler,
}

impl PitchShifter {
    /// Create a pitch shifter with a ratio of 1.0
    pub fn new(sample_rate: u32, num_channels: usize, quality: bool) -> Self {
        Self {
            pitch: 1.0,
            scaler: TimeScaler::new(sample_rate, num_channels, quality),
            resampler: Resampler::new(num_channels),
        }
    }

    /// Set the pitch ratio; 2.0 raises by an octave
    pub fn set_pitch(&mut self, pitch: f64) {
        self.pitch = pitch;
        self.scaler.set_speed(1.0 / pitch);
        self.resampler.set_step(pitch);
    }

    /// Current pitch ratio
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Enable or disable the full-rate period search
    pub fn set_quality(&mut self, quality: bool) {
        self.scaler.set_quality(quality);
    }

    fn is_shifting(&self) -> bool {
        self.pitch != 1.0
    }
}

impl Stage for PitchShifter {
    fn name(&self) -> &'static str {
        "pitch"
    }

    fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
        let active = self.is_shifting();
        let stretched = run_stage(&mut self.scaler, active, input.to_vec());
        let shifted = run_stage(&mut self.resampler, active, stretched);
        output.extend_from_slice(&shifted);
    }

    fn flush(&mut self, output: &mut Vec<i16>) {
        let mut stretched = Vec::new();
        self.scaler.flush(&mut stretched);
        let shifted = drive_stage(&mut self.resampler, true, stretched, true);
        output.extend_from_slice(&shifted);
    }

    fn is_idle(&self) -> bool {
        self.scaler.is_idle() && self.resampler.is_idle()
    }

    /// The resampler receives the stretched signal, `pitch` times as long
    fn reserve(&mut self, samples: usize) -> Result<()> {
        self.scaler.reserve(samples)?;
        self.resampler.reserve(scaled_samples(samples, self.pitch))
    }
}

// ============================================================================
// Chord Shifter
// ============================================================================

/// Harmonizer: one pitch-shifted voice per chord interval, mixed together
///
/// Voices hold back different amounts of audio, so each voice's output is
/// queued and only the span every voice has produced is mixed.
#[derive(Debug, Clone)]
pub struct ChordShifter {
    num_channels: usize,
    voices: Vec<PitchShifter>,
    queued: Vec<Vec<i16>>,
}

impl ChordShifter {
    /// Create a chord shifter rooted at a pitch ratio of 1.0
    pub fn new(sample_rate: u32, num_channels: usize, quality: bool) -> Self {
        let mut chord = Self {
            num_channels: num_channels.max(1),
            voices: CHORD_INTERVALS
                .iter()
                .map(|_| PitchShifter::new(sample_rate, num_channels, quality))
                .collect(),
            queued: vec![Vec::new(); CHORD_INTERVALS.len()],
        };
        chord.set_pitch(1.0);
        chord
    }

    /// Set the pitch ratio of the chord root
    pub fn set_pitch(&mut self, pitch: f64) {
        for (voice, interval) in self.voices.iter_mut().zip(CHORD_INTERVALS) {
            voice.set_pitch(pitch * interval);
        }
    }

    /// Enable or disable the full-rate period search in every voice
    pub fn set_quality(&mut self, quality: bool) {
        for voice in &mut self.voices {
            voice.set_quality(quality);
        }
    }

    /// Number of voices mixed
    pub fn num_voices(&self) -> usize {
        self.voices.len()
    }

    /// Mix the first `samples` queued samples of every voice
    ///
    /// Voices that ran short contribute silence.
    fn mix(&mut self, samples: usize, output: &mut Vec<i16>) {
        let voices = self.queued.len() as i32;
        output.reserve(samples);
        for i in 0..samples {
            let sum: i32 = self
                .queued
                .iter()
                .map(|q| q.get(i).copied().unwrap_or(0) as i32)
                .sum();
            let mixed = (sum / voices).clamp(i16::MIN as i32, i16::MAX as i32);
            output.push(mixed as i16);
        }
        for q in &mut self.queued {
            let n = samples.min(q.len());
            q.drain(..n);
        }
    }
}

impl Stage for ChordShifter {
    fn name(&self) -> &'static str {
        "chord"
    }

    fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
        for (voice, queue) in self.voices.iter_mut().zip(&mut self.queued) {
            voice.process(input, queue);
        }
        let ready = self.queued.iter().map(Vec::len).min().unwrap_or(0);
        let ready = ready - ready % self.num_channels;
        trace!("chord: mixing {} samples", ready);
        self.mix(ready, output);
    }

    fn flush(&mut self, output: &mut Vec<i16>) {
        for (voice, queue) in self.voices.iter_mut().zip(&mut self.queued) {
            voice.flush(queue);
        }
        let longest = self.queued.iter().map(Vec::len).max().unwrap_or(0);
        self.mix(longest, output);
    }

    fn is_idle(&self) -> bool {
        self.voices.iter().all(|voice| voice.is_idle()) && self.queued.iter().all(Vec::is_empty)
    }

    fn reserve(&mut self, samples: usize) -> Result<()> {
        for (voice, queue) in self.voices.iter_mut().zip(&mut self.queued) {
            voice.reserve(samples)?;
            queue.try_reserve(samples)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sample_rate: u32, frames: usize, amplitude: f64) -> Vec<i16> {
        (0..frames)
            .map(|i| {
                (amplitude * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin()).round()
                    as i16
            })
            .collect()
    }

    fn run<S: Stage>(stage: &mut S, input: &[i16], chunk: usize) -> Vec<i16> {
        let mut output = Vec::new();
        for block in input.chunks(chunk) {
            stage.process(block, &mut output);
        }
        stage.flush(&mut output);
        output
    }

    #[test]
    fn test_unity_pitch_passes_through() {
        let mut shifter = PitchShifter::new(16000, 1, false);
        let input = sine(300.0, 16000, 4000, 9000.0);
        let output = run(&mut shifter, &input, 512);
        assert_eq!(output, input);
        assert!(shifter.is_idle());
    }

    #[test]
    fn test_shift_keeps_duration() {
        for pitch in [0.5, 0.8, 1.25, 2.0] {
            let mut shifter = PitchShifter::new(16000, 1, false);
            shifter.set_pitch(pitch);
            let input = sine(200.0, 16000, 16000, 9000.0);
            let output = run(&mut shifter, &input, 1024);
            let tolerance = 3.0 * 16000.0 / 200.0;
            assert!(
                (output.len() as f64 - 16000.0).abs() <= tolerance,
                "pitch {}: got {} frames",
                pitch,
                output.len()
            );
        }
    }

    #[test]
    fn test_chord_voices_follow_root() {
        let mut chord = ChordShifter::new(16000, 1, false);
        chord.set_pitch(2.0);
        let pitches: Vec<f64> = chord.voices.iter().map(PitchShifter::pitch).collect();
        assert_eq!(pitches, vec![2.0, 2.5, 3.0]);
        assert_eq!(chord.num_voices(), 3);
    }

    #[test]
    fn test_chord_mix_does_not_clip() {
        let mut chord = ChordShifter::new(16000, 1, false);
        let input = sine(220.0, 16000, 8000, 32000.0);
        let output = run(&mut chord, &input, 800);
        let peak = output.iter().map(|&s| (s as i32).abs()).max().unwrap_or(0);
        assert!(peak > 1000, "Chord output should not be silent");
        assert!(peak < i16::MAX as i32, "Mix must be normalized");
        assert!((output.len() as i64 - 8000).abs() <= 2 * 73);
        assert!(chord.is_idle());
    }

    #[test]
    fn test_chord_stereo_alignment() {
        let mut chord = ChordShifter::new(16000, 2, false);
        let mono = sine(250.0, 16000, 4000, 8000.0);
        let stereo: Vec<i16> = mono.iter().flat_map(|&s| [s, s]).collect();
        let mut output = Vec::new();
        chord.process(&stereo, &mut output);
        assert_eq!(output.len() % 2, 0);
        chord.flush(&mut output);
        assert_eq!(output.len() % 2, 0);
        assert!(output.chunks_exact(2).all(|f| f[0] == f[1]));
    }
}
