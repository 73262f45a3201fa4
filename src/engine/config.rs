//! Stream configuration
//!
//! Holds the user-facing parameters of a stream. Presets can be loaded
//! from JSON; missing fields fall back to the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default sample rate when none is given
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default channel count when none is given
pub const DEFAULT_CHANNELS: usize = 1;

// ============================================================================
// Validation Helpers
// ============================================================================

/// Check a ratio parameter (pitch, speed, rate): finite and strictly positive
pub fn validate_ratio(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter { name, value })
    }
}

/// Check a volume: finite and non-negative (zero means silence)
pub fn validate_volume(value: f32) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter {
            name: "volume",
            value,
        })
    }
}

/// Check a sample rate
pub fn validate_sample_rate(sample_rate: u32) -> Result<()> {
    if sample_rate == 0 {
        return Err(EngineError::InvalidSampleRate(sample_rate));
    }
    Ok(())
}

/// Check a channel count
pub fn validate_channels(channels: usize) -> Result<()> {
    if channels == 0 {
        return Err(EngineError::InvalidChannels(channels));
    }
    Ok(())
}

// ============================================================================
// Stream Config
// ============================================================================

/// Parameters of a stream
///
/// Ratios equal to exactly 1.0 leave the signal untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channels per frame
    pub num_channels: usize,
    /// Pitch multiplier, duration unchanged
    pub pitch: f32,
    /// Speed multiplier, pitch unchanged
    pub speed: f32,
    /// Playback rate multiplier, changes pitch and duration together
    pub rate: f32,
    /// Linear output gain
    pub volume: f32,
    /// Harmonize the pitch-shifted output as a triad
    pub chord_pitch: bool,
    /// Search pitch periods at full rate instead of on a decimated copy
    pub quality: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            num_channels: DEFAULT_CHANNELS,
            pitch: 1.0,
            speed: 1.0,
            rate: 1.0,
            volume: 1.0,
            chord_pitch: false,
            quality: false,
        }
    }
}

impl StreamConfig {
    /// Create a config for the given format with every effect neutral
    pub fn new(sample_rate: u32, num_channels: usize) -> Self {
        Self {
            sample_rate,
            num_channels,
            ..Self::default()
        }
    }

    /// Validate every field
    pub fn validate(&self) -> Result<()> {
        validate_sample_rate(self.sample_rate)?;
        validate_channels(self.num_channels)?;
        validate_ratio("pitch", self.pitch)?;
        validate_ratio("speed", self.speed)?;
        validate_ratio("rate", self.rate)?;
        validate_volume(self.volume)
    }

    /// Load a preset from a JSON file
    ///
    /// # Errors
    /// * `Io` - If the file cannot be read
    /// * `Config` - If the JSON is malformed
    /// * Any validation error for out-of-range values
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        Ok(config)
    }

    /// Parse and validate a preset from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: StreamConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_neutral() {
        let config = StreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.num_channels, DEFAULT_CHANNELS);
        assert_eq!((config.pitch, config.speed, config.rate), (1.0, 1.0, 1.0));
        assert_eq!(config.volume, 1.0);
        assert!(!config.chord_pitch);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = StreamConfig::new(16000, 2);
        config.speed = 0.0;
        assert!(config.validate().is_err());

        config.speed = 1.0;
        config.pitch = f32::NAN;
        assert!(config.validate().is_err());

        config.pitch = 1.0;
        config.volume = 0.0;
        assert!(config.validate().is_ok(), "Zero volume is silence, not an error");

        config.volume = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_format() {
        assert!(StreamConfig::new(0, 1).validate().is_err());
        assert!(StreamConfig::new(8000, 0).validate().is_err());
        assert!(StreamConfig::new(8000, 6).validate().is_ok());
    }

    #[test]
    fn test_partial_json_preset() {
        let config = StreamConfig::from_json_str(r#"{ "speed": 1.5, "chord_pitch": true }"#)
            .unwrap();
        assert_eq!(config.speed, 1.5);
        assert!(config.chord_pitch);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.pitch, 1.0);
    }

    #[test]
    fn test_invalid_json_preset() {
        assert!(StreamConfig::from_json_str(r#"{ "rate": -2.0 }"#).is_err());
        assert!(StreamConfig::from_json_str("not json").is_err());
    }
}
