//! Error handling for Sonance
//!
//! Running short on buffered audio is never an error: it shows up as a
//! zero-length read. Errors cover rejected parameters, allocation failure,
//! and the file-level concerns of the command-line driver.

use thiserror::Error;

/// Result type alias for Sonance operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for Sonance operations
#[derive(Error, Debug)]
pub enum EngineError {
    // Configuration Errors
    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("Invalid channel count: {0} (must be at least 1)")]
    InvalidChannels(usize),

    #[error("Invalid sample rate: {0} Hz (must be positive)")]
    InvalidSampleRate(u32),

    // Resource Errors
    #[error("Out of memory: {details}")]
    OutOfMemory { details: String },

    // File Errors
    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl EngineError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::InvalidParameter { .. } => "INVALID_PARAMETER",
            EngineError::InvalidChannels(_) => "INVALID_CHANNELS",
            EngineError::InvalidSampleRate(_) => "INVALID_SAMPLE_RATE",
            EngineError::OutOfMemory { .. } => "OUT_OF_MEMORY",
            EngineError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            EngineError::Wav(_) => "WAV_ERROR",
            EngineError::Io(_) => "IO_ERROR",
            EngineError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Check if the same stream instance can keep being used after this error
    ///
    /// Rejected parameters leave the previous value in effect, so the stream
    /// stays usable. Allocation failure leaves state untouched but further
    /// writes may keep failing until memory is freed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidParameter { .. }
                | EngineError::InvalidChannels(_)
                | EngineError::InvalidSampleRate(_)
                | EngineError::OutOfMemory { .. }
        )
    }
}

impl From<std::collections::TryReserveError> for EngineError {
    fn from(err: std::collections::TryReserveError) -> Self {
        EngineError::OutOfMemory {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = EngineError::InvalidParameter {
            name: "speed",
            value: -1.0,
        };
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
        assert_eq!(EngineError::InvalidChannels(0).error_code(), "INVALID_CHANNELS");
    }

    #[test]
    fn test_recoverable() {
        assert!(EngineError::InvalidSampleRate(0).is_recoverable());
        let err = EngineError::UnsupportedFormat {
            format: "24-bit PCM".to_string(),
        };
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_display_mentions_parameter() {
        let err = EngineError::InvalidParameter {
            name: "pitch",
            value: 0.0,
        };
        assert!(err.to_string().contains("pitch"));
    }

    #[test]
    fn test_try_reserve_maps_to_out_of_memory() {
        let mut v: Vec<u8> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        let converted: EngineError = err.into();
        assert_eq!(converted.error_code(), "OUT_OF_MEMORY");
    }
}
