//! Sonance - Streaming Speed and Pitch Modification
//!
//! Sonance changes the speed, pitch and playback rate of 16-bit PCM audio
//! independently, fed and drained incrementally:
//! 1. Push raw interleaved bytes of any length with [`Stream::put_bytes`]
//! 2. Pull processed bytes with [`Stream::receive_bytes`]
//! 3. Call [`Stream::flush`] at end of input to release the held tail
//!
//! # Architecture
//!
//! The engine is a chain of streaming stages over interleaved frames:
//! - Rate: linear-interpolation resampling
//! - Speed: pitch-period overlap-add time scaling
//! - Pitch: time scaling followed by resampling, or a three-voice chord
//! - Volume: clamped linear gain
//!
//! # Example
//! ```
//! use sonance::Stream;
//!
//! let mut stream = Stream::new(16000, 1).unwrap();
//! stream.set_speed(1.5).unwrap();
//!
//! let tone: Vec<u8> = (0..16000)
//!     .map(|i| ((i as f32 * 0.1).sin() * 5000.0) as i16)
//!     .flat_map(|s| s.to_le_bytes())
//!     .collect();
//! assert!(stream.put_bytes(&tone));
//! stream.flush().unwrap();
//!
//! let mut out = vec![0u8; stream.available_bytes()];
//! let written = stream.receive_bytes(&mut out);
//! assert_eq!(written, out.len());
//! ```

pub mod cli;
pub mod dsp;
pub mod engine;
pub mod error;

pub use engine::{process_samples, Stream, StreamConfig};
pub use error::{EngineError, Result};
