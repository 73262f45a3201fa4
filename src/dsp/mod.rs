//! DSP Core
//!
//! Streaming transforms over interleaved 16-bit frames. Each stage
//! implements [`Stage`] so the stream controller can chain, bypass and
//! drain them uniformly.

pub mod pitch_detect;
pub mod pitch_shift;
pub mod resample;
pub mod stage;
pub mod time_scale;
pub mod volume;

pub use pitch_detect::{PeriodDetector, PeriodEstimate};
pub use pitch_shift::{ChordShifter, PitchShifter, CHORD_INTERVALS};
pub use resample::Resampler;
pub use stage::{drain_stage, drive_stage, run_stage, Stage};
pub use time_scale::TimeScaler;
pub use volume::apply_volume;
