//! Resampler
//!
//! Streaming linear-interpolation rate converter. Each output frame is read
//! at a fractional input position that advances by `step` frames, so a step
//! of 2.0 halves the duration and doubles the pitch.

use super::stage::Stage;
use crate::error::Result;

/// Linear interpolation between two samples
#[inline]
fn lerp(a: i16, b: i16, frac: f64) -> i16 {
    let a = a as f64;
    let b = b as f64;
    (a + (b - a) * frac).round() as i16
}

/// Streaming linear-interpolation resampler for interleaved frames
#[derive(Debug, Clone)]
pub struct Resampler {
    num_channels: usize,
    step: f64,
    /// Frames not yet passed by the read position; the first one is the
    /// left neighbour of the next output frame
    pending: Vec<i16>,
    /// Read position relative to the first pending frame
    position: f64,
}

impl Resampler {
    /// Create a resampler with a step of 1.0
    pub fn new(num_channels: usize) -> Self {
        Self {
            num_channels: num_channels.max(1),
            step: 1.0,
            pending: Vec::new(),
            position: 0.0,
        }
    }

    /// Set the input frames consumed per output frame
    pub fn set_step(&mut self, step: f64) {
        self.step = step;
    }

    fn pending_frames(&self) -> usize {
        self.pending.len() / self.num_channels
    }

    /// Emit one frame interpolated at the current position
    fn emit(&self, index: usize, next: usize, frac: f64, output: &mut Vec<i16>) {
        let ch = self.num_channels;
        let left = &self.pending[index * ch..(index + 1) * ch];
        let right = &self.pending[next * ch..(next + 1) * ch];
        output.extend(left.iter().zip(right).map(|(&a, &b)| lerp(a, b, frac)));
    }
}

impl Stage for Resampler {
    fn name(&self) -> &'static str {
        "resample"
    }

    fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
        self.pending.extend_from_slice(input);
        let frames = self.pending_frames();

        loop {
            let index = self.position.floor() as usize;
            if index + 1 >= frames {
                break;
            }
            self.emit(index, index + 1, self.position - index as f64, output);
            self.position += self.step;
        }

        let passed = (self.position.floor() as usize).min(frames);
        self.pending.drain(..passed * self.num_channels);
        self.position -= passed as f64;
    }

    /// Emit the frames whose right neighbour never arrived, holding the last
    /// input frame in place of it
    fn flush(&mut self, output: &mut Vec<i16>) {
        let frames = self.pending_frames();
        while frames > 0 {
            let index = self.position.floor() as usize;
            if index >= frames {
                break;
            }
            let next = (index + 1).min(frames - 1);
            self.emit(index, next, self.position - index as f64, output);
            self.position += self.step;
        }
        self.pending.clear();
        self.position = 0.0;
    }

    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.position == 0.0
    }

    fn reserve(&mut self, samples: usize) -> Result<()> {
        self.pending.try_reserve(samples)?;
        Ok(())
    }
}
