//! Volume
//!
//! Linear gain on 16-bit samples with a hard clamp at full scale, so loud
//! input driven above unity saturates instead of wrapping around.

/// Scale one sample, clamping to the 16-bit range
#[inline]
pub fn scale_sample(sample: i16, volume: f32) -> i16 {
    let scaled = (sample as f32 * volume).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Apply `volume` to every sample in place
///
/// A volume of exactly 1.0 leaves the samples untouched.
pub fn apply_volume(samples: &mut [i16], volume: f32) {
    // Unity gain optimization
    if volume == 1.0 {
        return;
    }
    for sample in samples.iter_mut() {
        *sample = scale_sample(*sample, volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_is_untouched() {
        let mut samples = vec![i16::MIN, -1, 0, 1, i16::MAX];
        apply_volume(&mut samples, 1.0);
        assert_eq!(samples, vec![i16::MIN, -1, 0, 1, i16::MAX]);
    }

    #[test]
    fn test_half_volume() {
        let mut samples = vec![1000, -1000, 3];
        apply_volume(&mut samples, 0.5);
        assert_eq!(samples, vec![500, -500, 2]);
    }

    #[test]
    fn test_zero_volume_is_silence() {
        let mut samples = vec![12345, -12345];
        apply_volume(&mut samples, 0.0);
        assert_eq!(samples, vec![0, 0]);
    }

    #[test]
    fn test_loud_input_clamps() {
        let mut samples = vec![20000, -20000, 100];
        apply_volume(&mut samples, 4.0);
        assert_eq!(samples, vec![i16::MAX, i16::MIN, 400]);
    }
}
