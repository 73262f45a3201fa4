//! Sample Buffer
//!
//! Staging between the byte-oriented public API and the frame-oriented DSP
//! core. Bytes pushed in are held until whole frames are available; processed
//! samples are queued as little-endian bytes until the caller pulls them.

use std::collections::VecDeque;

use log::debug;

use crate::error::Result;

/// Bytes per 16-bit sample
pub const BYTES_PER_SAMPLE: usize = 2;

// ============================================================================
// Codec Helpers
// ============================================================================

/// Decode little-endian 16-bit PCM bytes into samples
///
/// A trailing odd byte is ignored.
pub fn decode_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Encode samples as little-endian 16-bit PCM bytes
pub fn encode_samples(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

// ============================================================================
// Sample Buffer
// ============================================================================

/// Input staging and output queue of a stream
///
/// Growth goes through `try_reserve`, so running out of memory is reported
/// as an error and leaves the buffer as it was before the call.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    frame_bytes: usize,
    residual: Vec<u8>,
    output: VecDeque<u8>,
}

impl SampleBuffer {
    /// Create an empty buffer for frames of `num_channels` samples
    pub fn new(num_channels: usize) -> Self {
        Self {
            frame_bytes: num_channels.max(1) * BYTES_PER_SAMPLE,
            residual: Vec::new(),
            output: VecDeque::new(),
        }
    }

    /// Change the frame layout
    ///
    /// An incomplete frame held from the old layout cannot be completed any
    /// more and is dropped. Queued output is kept.
    pub fn set_num_channels(&mut self, num_channels: usize) {
        self.frame_bytes = num_channels.max(1) * BYTES_PER_SAMPLE;
        self.residual.clear();
    }

    /// Stage raw bytes and return every complete frame as samples
    ///
    /// Bytes that do not complete a frame are held for the next call.
    ///
    /// # Errors
    /// * `OutOfMemory` - If staging space cannot be allocated. Nothing is
    ///   consumed in that case.
    pub fn append(&mut self, bytes: &[u8]) -> Result<Vec<i16>> {
        let held = self.residual.len();
        let total = held + bytes.len();
        let whole = total - total % self.frame_bytes;

        let mut samples = Vec::new();
        samples.try_reserve_exact(whole / BYTES_PER_SAMPLE)?;
        self.residual.try_reserve(bytes.len())?;

        self.residual.extend_from_slice(bytes);
        samples.extend(
            self.residual[..whole]
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );
        self.residual.drain(..whole);
        Ok(samples)
    }

    /// Samples [`append`](Self::append) would return for `bytes` more bytes
    pub fn samples_completed_by(&self, bytes: usize) -> usize {
        let total = self.residual.len() + bytes;
        (total - total % self.frame_bytes) / BYTES_PER_SAMPLE
    }

    /// Reserve queue room for `samples` more output samples
    ///
    /// # Errors
    /// * `OutOfMemory` - If the queue cannot grow that far
    pub fn reserve_output(&mut self, samples: usize) -> Result<()> {
        self.output
            .try_reserve(samples.saturating_mul(BYTES_PER_SAMPLE))?;
        Ok(())
    }

    /// Number of bytes held waiting to complete a frame
    pub fn residual_bytes(&self) -> usize {
        self.residual.len()
    }

    /// Drop any incomplete frame
    pub fn discard_residual(&mut self) {
        self.residual.clear();
    }

    /// Drop a half sample left at the end of the staged bytes
    ///
    /// Whole samples of an incomplete frame are kept, so sample-level writes
    /// continue the frame where the byte-level writes stopped.
    pub fn discard_partial_sample(&mut self) {
        if self.residual.len() % BYTES_PER_SAMPLE != 0 {
            debug!("Dropping half sample staged before a sample write");
            self.residual.pop();
        }
    }

    /// Queue processed samples for the caller
    ///
    /// # Errors
    /// * `OutOfMemory` - If the queue cannot grow. The queue is unchanged.
    pub fn push_output(&mut self, samples: &[i16]) -> Result<()> {
        self.output.try_reserve(samples.len() * BYTES_PER_SAMPLE)?;
        for sample in samples {
            self.output.extend(sample.to_le_bytes());
        }
        Ok(())
    }

    /// Move up to `out.len()` queued bytes into `out`
    ///
    /// # Returns
    /// Number of bytes copied; 0 when nothing is ready.
    pub fn take(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.output.len());
        for (dst, src) in out.iter_mut().zip(self.output.drain(..count)) {
            *dst = src;
        }
        count
    }

    /// Move up to `out.len()` queued samples into `out`
    ///
    /// If a byte-level read stopped inside a sample, the rest of that sample
    /// is dropped first so samples stay aligned.
    ///
    /// # Returns
    /// Number of samples copied.
    pub fn take_samples(&mut self, out: &mut [i16]) -> usize {
        if self.output.len() % BYTES_PER_SAMPLE != 0 {
            debug!("Dropping the rest of a sample split by a byte read");
            self.output.pop_front();
        }
        let count = out.len().min(self.output.len() / BYTES_PER_SAMPLE);
        for dst in out.iter_mut().take(count) {
            let lo = self.output.pop_front().unwrap_or_default();
            let hi = self.output.pop_front().unwrap_or_default();
            *dst = i16::from_le_bytes([lo, hi]);
        }
        count
    }

    /// Bytes ready to be taken
    pub fn available(&self) -> usize {
        self.output.len()
    }

    /// Release all staged and queued data
    pub fn clear(&mut self) {
        self.residual.clear();
        self.residual.shrink_to_fit();
        self.output.clear();
        self.output.shrink_to_fit();
    }
}
