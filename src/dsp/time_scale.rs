//! Time-Scale Modifier
//!
//! Changes duration without changing pitch by splicing whole pitch periods.
//! Speeding up drops periods, slowing down repeats them; every splice is a
//! linear cross-fade one period long, so the waveform stays continuous.
//!
//! When to splice is driven by `drift`: the number of frames the output is
//! behind (positive) or ahead of (negative) `consumed / speed`. Plain copies
//! move it by `period / speed - period`; once a copy would push it a full
//! period out, a splice is made that brings it back near zero.

use log::trace;

use super::pitch_detect::PeriodDetector;
use super::stage::Stage;
use crate::error::Result;

/// Most input one splice may span, in detection windows
const MAX_SPLICE_WINDOWS: usize = 8;

/// Cross-fade `fade_out` into `fade_in` over `frames` frames and append
///
/// The first output frame equals `fade_out[0]`; the weight moves linearly
/// towards `fade_in`.
pub fn overlap_add(
    output: &mut Vec<i16>,
    fade_out: &[i16],
    fade_in: &[i16],
    frames: usize,
    num_channels: usize,
) {
    let total = frames as i64;
    for t in 0..frames {
        let w_in = t as i64;
        let w_out = total - w_in;
        let base = t * num_channels;
        for c in 0..num_channels {
            let a = fade_out[base + c] as i64;
            let b = fade_in[base + c] as i64;
            output.push(((a * w_out + b * w_in) / total) as i16);
        }
    }
}

/// Period-synchronous overlap-add time stretcher
#[derive(Debug, Clone)]
pub struct TimeScaler {
    num_channels: usize,
    speed: f64,
    detector: PeriodDetector,
    input: Vec<i16>,
    /// First unprocessed frame in `input`
    position: usize,
    /// Expected output frames minus emitted output frames
    drift: f64,
    /// Fractional part of the period estimate not yet spent on a splice
    period_carry: f64,
}

impl TimeScaler {
    /// Create a time scaler
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz, sets the period search range
    /// * `num_channels` - Interleaved channels per frame
    /// * `quality` - Full-rate period search
    pub fn new(sample_rate: u32, num_channels: usize, quality: bool) -> Self {
        Self {
            num_channels: num_channels.max(1),
            speed: 1.0,
            detector: PeriodDetector::new(sample_rate, num_channels, quality),
            input: Vec::new(),
            position: 0,
            drift: 0.0,
            period_carry: 0.0,
        }
    }

    /// Set the speed factor; 2.0 halves the duration
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    /// Enable or disable the full-rate period search
    pub fn set_quality(&mut self, quality: bool) {
        self.detector.set_quality(quality);
    }

    /// Frames needed ahead of the current position before a splice is decided
    pub fn window_frames(&self) -> usize {
        self.detector.window_frames()
    }

    /// Frames received but not yet turned into output
    pub fn pending_frames(&self) -> usize {
        self.input.len() / self.num_channels - self.position
    }

    /// Input frames kept ahead of the position so any step can complete
    fn lookahead_frames(&self) -> usize {
        (MAX_SPLICE_WINDOWS + 1) * self.window_frames()
    }

    /// Most periods one splice may skip or repeat
    fn max_splice_periods(&self, period: usize) -> usize {
        (MAX_SPLICE_WINDOWS * self.window_frames() / period).max(2) - 1
    }

    fn frame(&self, index: usize) -> &[i16] {
        &self.input[index * self.num_channels..]
    }

    /// Integer period for the next splice, with the carry it leaves behind
    ///
    /// Rounding error is carried forward so the average splice length
    /// matches the fractional estimate.
    fn plan_period(&self, estimate: f64, voiced: bool) -> (usize, f64) {
        if !voiced {
            return (estimate.round().max(1.0) as usize, 0.0);
        }
        let target = estimate + self.period_carry;
        let period = target.round().max(1.0);
        (period as usize, target - period)
    }

    /// Process one period at the current position
    ///
    /// Returns false when more input is needed first.
    fn step(&mut self, output: &mut Vec<i16>) -> bool {
        let available = self.pending_frames();
        if available < self.window_frames() {
            return false;
        }

        let start = self.position * self.num_channels;
        let estimate = self.detector.detect(&self.input[start..]);
        let (period, carry) = self.plan_period(estimate.period, estimate.voiced);
        let p = period as f64;
        let speed = self.speed;
        let ch = self.num_channels;

        let after_copy = self.drift + p / speed - p;
        let limit = self.max_splice_periods(period);

        if after_copy <= -p {
            let wanted = (speed * (p - self.drift) / p).round() - 1.0;
            if wanted > limit as f64 {
                // Too far ahead for one splice: drop periods without output
                let consumed = (limit + 1) * period;
                if available < consumed {
                    return false;
                }
                self.position += consumed;
                self.drift += consumed as f64 / speed;
                self.period_carry = carry;
                return true;
            }
            // Drop `skip` periods, fading the current one into the next kept one
            let skip = wanted.max(1.0) as usize;
            let consumed = (skip + 1) * period;
            if available < consumed {
                return false;
            }
            let fade_out = self.frame(self.position)[..period * ch].to_vec();
            let fade_in = &self.frame(self.position + skip * period)[..period * ch];
            overlap_add(output, &fade_out, fade_in, period, ch);
            self.position += consumed;
            self.drift += consumed as f64 / speed - p;
        } else if after_copy >= p {
            // Repeat the current period, fading back from the next one
            let repeats = (((self.drift + p / speed) / p).round() - 1.0).clamp(1.0, limit as f64)
                as usize;
            if available < 2 * period {
                return false;
            }
            let current = self.frame(self.position)[..period * ch].to_vec();
            let next = self.frame(self.position + period)[..period * ch].to_vec();
            output.extend_from_slice(&current);
            for _ in 0..repeats {
                overlap_add(output, &next, &current, period, ch);
            }
            self.position += period;
            self.drift += p / speed - ((repeats + 1) * period) as f64;
        } else {
            output.extend_from_slice(&self.frame(self.position)[..period * ch]);
            self.position += period;
            self.drift += p / speed - p;
        }
        self.period_carry = carry;
        true
    }

    fn compact(&mut self) {
        if self.position > 0 {
            self.input.drain(..self.position * self.num_channels);
            self.position = 0;
        }
    }

    fn clear(&mut self) {
        self.input.clear();
        self.position = 0;
        self.drift = 0.0;
        self.period_carry = 0.0;
    }
}

impl Stage for TimeScaler {
    fn name(&self) -> &'static str {
        "time-scale"
    }

    fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
        self.input.extend_from_slice(input);
        let before = output.len();
        while self.step(output) {}
        self.compact();
        trace!(
            "time-scale: {} frames in, {} out, {} held",
            input.len() / self.num_channels,
            (output.len() - before) / self.num_channels,
            self.pending_frames()
        );
    }

    /// Splice through the remaining input, padding it with silence so the
    /// last periods can still be detected and joined, then cut the result to
    /// the length the speed calls for.
    ///
    /// Padding is added once and covers the largest step.
    fn flush(&mut self, output: &mut Vec<i16>) {
        let end = self.input.len() / self.num_channels;
        if self.position >= end {
            self.clear();
            return;
        }

        let remaining = (end - self.position) as f64;
        let expected = (self.drift + remaining / self.speed).round().max(0.0);
        let limit = (output.len() as f64 + expected * self.num_channels as f64)
            .min(usize::MAX as f64) as usize;
        let pad = self.lookahead_frames() * self.num_channels;

        self.input.resize(self.input.len() + pad, 0);
        while self.position < end && output.len() < limit {
            if !self.step(output) {
                break;
            }
        }

        output.truncate(limit);
        self.clear();
    }

    fn is_idle(&self) -> bool {
        self.input.is_empty()
    }

    fn reserve(&mut self, samples: usize) -> Result<()> {
        self.input.try_reserve(samples)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use test_case::test_case;

    fn sine(freq: f64, sample_rate: u32, frames: usize) -> Vec<i16> {
        (0..frames)
            .map(|i| {
                (8000.0 * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin()).round() as i16
            })
            .collect()
    }

    fn stretch(speed: f64, input: &[i16], chunk: usize) -> Vec<i16> {
        let mut scaler = TimeScaler::new(16000, 1, false);
        scaler.set_speed(speed);
        let mut output = Vec::new();
        for block in input.chunks(chunk) {
            scaler.process(block, &mut output);
        }
        scaler.flush(&mut output);
        output
    }

    #[test]
    fn test_overlap_add_endpoints() {
        let mut out = Vec::new();
        overlap_add(&mut out, &[1000, 1000, 1000, 1000], &[0, 0, 0, 0], 4, 1);
        assert_eq!(out, vec![1000, 750, 500, 250]);
    }

    #[test]
    fn test_overlap_add_stereo() {
        let mut out = Vec::new();
        overlap_add(&mut out, &[100, -100, 100, -100], &[0, 0, 0, 0], 2, 2);
        assert_eq!(out, vec![100, -100, 50, -50]);
    }

    #[test_case(2.0 ; "double speed")]
    #[test_case(1.5 ; "one and a half")]
    #[test_case(0.5 ; "half speed")]
    #[test_case(0.75 ; "three quarter speed")]
    #[test_case(3.0 ; "triple speed")]
    fn test_duration_scales(speed: f64) {
        let input = sine(220.0, 16000, 16000);
        let output = stretch(speed, &input, 1000);
        let expected = 16000.0 / speed;
        let period = 16000.0 / 220.0;
        assert!(
            (output.len() as f64 - expected).abs() <= period + 1.0,
            "speed {}: expected ~{} frames, got {}",
            speed,
            expected,
            output.len()
        );
    }

    #[test_case(1.0e6 ; "million")]
    #[test_case(1.0e30 ; "beyond any input")]
    fn test_extreme_speed_drops_everything(speed: f64) {
        let input = sine(220.0, 16000, 16000);
        let small = stretch(speed, &input, 1000);
        let whole = stretch(speed, &input, 16000);
        let period = 16000.0 / 220.0;
        assert!(
            small.len() as f64 <= period + 1.0,
            "speed {}: got {} frames",
            speed,
            small.len()
        );
        assert_eq!(small, whole);
    }

    #[test]
    fn test_extreme_speed_flush_is_bounded() {
        let mut scaler = TimeScaler::new(16000, 1, false);
        scaler.set_speed(1.0e6);
        let mut output = Vec::new();
        scaler.process(&sine(440.0, 16000, 500), &mut output);
        scaler.flush(&mut output);
        assert!(scaler.is_idle());
        assert!(output.len() <= 37, "Flush produced {} frames", output.len());
    }

    #[test]
    fn test_fast_speed_keeps_duration() {
        // Past the largest single splice: whole periods are dropped
        let input = sine(220.0, 16000, 64000);
        let output = stretch(400.0, &input, 4000);
        let period = 16000.0 / 220.0;
        assert!(
            (output.len() as f64 - 160.0).abs() <= 2.0 * period,
            "Expected ~160 frames, got {}",
            output.len()
        );
    }

    #[test]
    fn test_chunk_size_does_not_change_length() {
        let input = sine(300.0, 16000, 8000);
        let whole = stretch(1.25, &input, 8000);
        let small = stretch(1.25, &input, 37);
        assert_eq!(whole.len(), small.len());
        assert_eq!(whole, small);
    }

    #[test]
    fn test_holds_back_until_window() {
        let mut scaler = TimeScaler::new(16000, 1, false);
        scaler.set_speed(2.0);
        let mut output = Vec::new();
        scaler.process(&sine(440.0, 16000, 100), &mut output);
        assert!(output.is_empty());
        assert!(!scaler.is_idle());
        assert_eq!(scaler.pending_frames(), 100);

        scaler.flush(&mut output);
        assert!(scaler.is_idle());
        assert!(!output.is_empty());
        assert!(output.len() <= 50, "Flush overshot: {} frames", output.len());
    }

    #[test]
    fn test_splices_stay_in_range() {
        let mut scaler = TimeScaler::new(16000, 1, false);
        scaler.set_speed(0.5);
        let mut output = Vec::new();
        scaler.process(&vec![i16::MAX; 4000], &mut output);
        assert!(!output.is_empty());
        assert!(output.iter().all(|&s| s == i16::MAX));
    }

    #[test]
    fn test_silence_is_stretched() {
        let output = stretch(0.5, &vec![0i16; 3200], 3200);
        assert!((output.len() as i64 - 6400).abs() <= 161);
        assert!(output.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_stereo_keeps_channels_apart() {
        let left = sine(200.0, 16000, 6400);
        let stereo: Vec<i16> = left.iter().flat_map(|&s| [s, 0]).collect();
        let mut scaler = TimeScaler::new(16000, 2, false);
        scaler.set_speed(1.5);
        let mut output = Vec::new();
        scaler.process(&stereo, &mut output);
        scaler.flush(&mut output);

        assert_eq!(output.len() % 2, 0);
        assert!(output.chunks_exact(2).all(|frame| frame[1] == 0));
        assert!(output.chunks_exact(2).any(|frame| frame[0] != 0));
    }
}
