//! Period Detector
//!
//! Estimates the pitch period of the most recent input window by normalized
//! cross-correlation. The coarse search runs on a mono, decimated copy of the
//! signal (about 4 kHz); the winning lag is then refined at full rate and
//! interpolated to a fractional period.

// ============================================================================
// Constants
// ============================================================================

/// Lowest fundamental searched (longest period)
pub const MIN_PITCH_HZ: u32 = 50;

/// Highest fundamental searched (shortest period)
pub const MAX_PITCH_HZ: u32 = 800;

/// Fundamental assumed when no lag correlates well enough
pub const DEFAULT_PITCH_HZ: u32 = 100;

/// Target rate of the decimated search signal
pub const DECIMATED_RATE: u32 = 4000;

/// Minimum normalized correlation for a lag to count as a period
pub const ACCEPT_THRESHOLD: f64 = 0.5;

/// Peaks this close to the best correlation are ties; the shortest wins
const TIE_TOLERANCE: f64 = 0.05;

/// Energy floor below which a segment is treated as silent
const ENERGY_EPSILON: f64 = 1e-9;

// ============================================================================
// Helper Functions
// ============================================================================

/// Normalized cross-correlation of two equally long segments
///
/// Returns 0.0 when either segment has no energy.
#[inline]
pub fn normalized_cross_correlation(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut energy_a = 0.0;
    let mut energy_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        dot += x * y;
        energy_a += x * x;
        energy_b += y * y;
    }
    let denom = (energy_a * energy_b).sqrt();
    if denom < ENERGY_EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Correlation of `signal` with itself shifted by `lag`, over `len` samples
#[inline]
fn lag_correlation(signal: &[f64], lag: usize, len: usize) -> f64 {
    normalized_cross_correlation(&signal[..len], &signal[lag..lag + len])
}

/// Offset of the vertex of the parabola through three equally spaced points
///
/// Clamped to half a sample either side of the middle point.
#[inline]
fn parabolic_offset(left: f64, center: f64, right: f64) -> f64 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < ENERGY_EPSILON {
        return 0.0;
    }
    (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
}

// ============================================================================
// Period Estimate
// ============================================================================

/// Result of one detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodEstimate {
    /// Period in frames, possibly fractional
    pub period: f64,
    /// False when the fallback period was used
    pub voiced: bool,
}

// ============================================================================
// Period Detector
// ============================================================================

/// Pitch period estimator for interleaved 16-bit frames
#[derive(Debug, Clone)]
pub struct PeriodDetector {
    num_channels: usize,
    min_period: usize,
    max_period: usize,
    default_period: usize,
    decimation: usize,
    quality: bool,
    mono: Vec<f64>,
    decimated: Vec<f64>,
}

impl PeriodDetector {
    /// Create a detector for the given format
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `num_channels` - Interleaved channels per frame
    /// * `quality` - Search at full rate instead of on the decimated signal
    pub fn new(sample_rate: u32, num_channels: usize, quality: bool) -> Self {
        let sample_rate = sample_rate.max(1);
        let min_period = (sample_rate / MAX_PITCH_HZ).max(1) as usize;
        let max_period = ((sample_rate / MIN_PITCH_HZ) as usize).max(min_period + 1);
        let default_period =
            ((sample_rate / DEFAULT_PITCH_HZ) as usize).clamp(min_period, max_period);
        let decimation = if sample_rate > DECIMATED_RATE {
            (sample_rate / DECIMATED_RATE) as usize
        } else {
            1
        };

        Self {
            num_channels: num_channels.max(1),
            min_period,
            max_period,
            default_period,
            decimation,
            quality,
            mono: Vec::with_capacity(2 * max_period),
            decimated: Vec::with_capacity(2 * max_period / decimation + 1),
        }
    }

    /// Shortest period searched, in frames
    pub fn min_period(&self) -> usize {
        self.min_period
    }

    /// Longest period searched, in frames
    pub fn max_period(&self) -> usize {
        self.max_period
    }

    /// Period reported for unvoiced or silent input
    pub fn default_period(&self) -> usize {
        self.default_period
    }

    /// Frames the detector looks at per estimate
    pub fn window_frames(&self) -> usize {
        2 * self.max_period
    }

    /// Whether the full-rate search is enabled
    pub fn quality(&self) -> bool {
        self.quality
    }

    /// Enable or disable the full-rate search
    pub fn set_quality(&mut self, quality: bool) {
        self.quality = quality;
    }

    fn fallback(&self) -> PeriodEstimate {
        PeriodEstimate {
            period: self.default_period as f64,
            voiced: false,
        }
    }

    /// Estimate the period at the start of `frames`
    ///
    /// Looks at up to [`window_frames`](Self::window_frames) frames. Shorter
    /// input narrows the lag range; input too short to hold two minimum
    /// periods gets the fallback period.
    pub fn detect(&mut self, frames: &[i16]) -> PeriodEstimate {
        let available = frames.len() / self.num_channels;
        let window = available.min(self.window_frames());
        let max_lag = self.max_period.min(window / 2);
        if max_lag <= self.min_period {
            return self.fallback();
        }

        self.mix_to_mono(frames, window);

        let skip = if self.quality { 1 } else { self.decimation };
        let coarse = if skip > 1 {
            self.decimate(skip);
            let min_lag = self.min_period.div_ceil(skip).max(1);
            let max_lag_dec = max_lag / skip;
            if max_lag_dec <= min_lag {
                return self.fallback();
            }
            match search_lag(&self.decimated, min_lag, max_lag_dec) {
                Some((lag, _)) => lag,
                None => return self.fallback(),
            }
        } else {
            match search_lag(&self.mono, self.min_period, max_lag) {
                Some((lag, _)) => lag,
                None => return self.fallback(),
            }
        };

        // Refine around the coarse lag at full rate
        let lo = (coarse.saturating_sub(1) * skip).max(self.min_period);
        let hi = ((coarse + 1) * skip).min(max_lag);
        let len = self.mono.len() - hi;
        let mut best_lag = lo;
        let mut best_corr = f64::NEG_INFINITY;
        for lag in lo..=hi {
            let corr = lag_correlation(&self.mono, lag, len);
            if corr > best_corr {
                best_corr = corr;
                best_lag = lag;
            }
        }

        if best_corr < ACCEPT_THRESHOLD {
            return self.fallback();
        }

        let mut period = best_lag as f64;
        if best_lag > self.min_period && best_lag < max_lag {
            let n = self.mono.len() - (best_lag + 1);
            let left = lag_correlation(&self.mono, best_lag - 1, n);
            let center = lag_correlation(&self.mono, best_lag, n);
            let right = lag_correlation(&self.mono, best_lag + 1, n);
            period += parabolic_offset(left, center, right);
        }

        PeriodEstimate {
            period,
            voiced: true,
        }
    }

    fn mix_to_mono(&mut self, frames: &[i16], window: usize) {
        let ch = self.num_channels;
        self.mono.clear();
        self.mono.extend(frames[..window * ch].chunks_exact(ch).map(|frame| {
            frame.iter().map(|&s| s as f64).sum::<f64>() / ch as f64
        }));
    }

    fn decimate(&mut self, skip: usize) {
        self.decimated.clear();
        self.decimated.extend(
            self.mono
                .chunks_exact(skip)
                .map(|block| block.iter().sum::<f64>() / skip as f64),
        );
    }
}

/// Find the period lag in `signal` within `[min_lag, max_lag]`
///
/// Among local correlation peaks within [`TIE_TOLERANCE`] of the best, the
/// shortest lag wins. Returns `None` when nothing clears
/// [`ACCEPT_THRESHOLD`].
fn search_lag(signal: &[f64], min_lag: usize, max_lag: usize) -> Option<(usize, f64)> {
    let max_lag = max_lag.min(signal.len().saturating_sub(1));
    if max_lag < min_lag {
        return None;
    }
    let len = signal.len() - max_lag;

    let correlations: Vec<f64> = (min_lag..=max_lag)
        .map(|lag| lag_correlation(signal, lag, len))
        .collect();

    let (best_idx, best) = correlations
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, c)| if c > acc.1 { (i, c) } else { acc });

    if best < ACCEPT_THRESHOLD {
        return None;
    }

    // Interior peaks only; an edge can still win as the global best
    let last = correlations.len() - 1;
    let chosen = (1..last)
        .find(|&i| {
            let c = correlations[i];
            c >= correlations[i - 1]
                && c >= correlations[i + 1]
                && c >= best - TIE_TOLERANCE
                && c >= ACCEPT_THRESHOLD
        })
        .unwrap_or(best_idx);

    Some((min_lag + chosen, correlations[chosen]))
}
