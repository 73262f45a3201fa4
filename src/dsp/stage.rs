//! Pipeline stage trait
//!
//! Every transform in the stream (rate, speed, pitch, chord) is a streaming
//! stage: it accepts interleaved frames in arbitrary amounts, may hold some
//! back as context, and releases everything on flush.

use log::debug;

use crate::error::Result;

/// A streaming transform over interleaved 16-bit frames
pub trait Stage {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Consume `input` and append whatever output is ready to `output`
    fn process(&mut self, input: &[i16], output: &mut Vec<i16>);

    /// Emit everything still held, then return to the idle state
    fn flush(&mut self, output: &mut Vec<i16>);

    /// True when the stage holds no audio and no carried state
    fn is_idle(&self) -> bool;

    /// Reserve room for `samples` more input samples ahead of [`process`]
    ///
    /// # Errors
    /// * `OutOfMemory` - If the stage's buffers cannot grow
    ///
    /// [`process`]: Stage::process
    fn reserve(&mut self, samples: usize) -> Result<()>;
}

/// Upper estimate of a sample count after scaling its duration by `factor`
pub fn scaled_samples(samples: usize, factor: f64) -> usize {
    (samples as f64 * factor).ceil().min(usize::MAX as f64) as usize
}

/// Run `input` through `stage`, or around it when `active` is false
///
/// An inactive stage that still holds audio from before it was switched off
/// is drained first, so nothing it buffered is lost or reordered. An idle,
/// inactive stage costs nothing: the input is returned untouched.
pub fn run_stage<S: Stage>(stage: &mut S, active: bool, input: Vec<i16>) -> Vec<i16> {
    if active {
        let mut output = Vec::with_capacity(input.len());
        stage.process(&input, &mut output);
        return output;
    }

    if stage.is_idle() {
        return input;
    }

    debug!("Draining {} stage before bypass", stage.name());
    let mut output = Vec::new();
    stage.flush(&mut output);
    output.extend_from_slice(&input);
    output
}

/// Flush a stage that was switched off, returning what it still held
pub fn drain_stage<S: Stage>(stage: &mut S) -> Vec<i16> {
    let mut output = Vec::new();
    if !stage.is_idle() {
        debug!("Draining {} stage", stage.name());
        stage.flush(&mut output);
    }
    output
}

/// Like [`run_stage`], additionally flushing an active stage when `flushing`
pub fn drive_stage<S: Stage>(
    stage: &mut S,
    active: bool,
    input: Vec<i16>,
    flushing: bool,
) -> Vec<i16> {
    let mut output = run_stage(stage, active, input);
    if flushing && active {
        stage.flush(&mut output);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Holds back the last sample it sees until flushed
    struct Delay {
        held: Option<i16>,
    }

    impl Stage for Delay {
        fn name(&self) -> &'static str {
            "delay"
        }

        fn process(&mut self, input: &[i16], output: &mut Vec<i16>) {
            for &s in input {
                if let Some(prev) = self.held.replace(s) {
                    output.push(prev);
                }
            }
        }

        fn flush(&mut self, output: &mut Vec<i16>) {
            output.extend(self.held.take());
        }

        fn is_idle(&self) -> bool {
            self.held.is_none()
        }

        fn reserve(&mut self, _samples: usize) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_inactive_idle_stage_is_bypassed() {
        let mut stage = Delay { held: None };
        let out = run_stage(&mut stage, false, vec![1, 2, 3]);
        assert_eq!(out, vec![1, 2, 3]);
        assert!(stage.is_idle());
    }

    #[test]
    fn test_active_stage_processes() {
        let mut stage = Delay { held: None };
        let out = run_stage(&mut stage, true, vec![1, 2, 3]);
        assert_eq!(out, vec![1, 2]);
        assert!(!stage.is_idle());
    }

    #[test]
    fn test_deactivated_stage_is_drained_in_order() {
        let mut stage = Delay { held: None };
        let first = run_stage(&mut stage, true, vec![1, 2, 3]);
        let second = run_stage(&mut stage, false, vec![4, 5]);
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![3, 4, 5]);
        assert!(stage.is_idle());
    }

    #[test]
    fn test_drain_stage() {
        let mut stage = Delay { held: None };
        assert!(drain_stage(&mut stage).is_empty());
        run_stage(&mut stage, true, vec![1, 2]);
        assert_eq!(drain_stage(&mut stage), vec![2]);
        assert!(stage.is_idle());
    }

    #[test]
    fn test_scaled_samples() {
        assert_eq!(scaled_samples(100, 0.5), 50);
        assert_eq!(scaled_samples(3, 1.0 / 3.0), 1);
        assert_eq!(scaled_samples(10, 1.0e30), usize::MAX);
    }

    #[test]
    fn test_drive_stage_flushes() {
        let mut stage = Delay { held: None };
        let out = drive_stage(&mut stage, true, vec![7, 8], true);
        assert_eq!(out, vec![7, 8]);
        assert!(stage.is_idle());
    }
}
