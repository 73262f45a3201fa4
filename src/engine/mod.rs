//! Stream Engine Module
//!
//! The public face of the crate:
//! - Stream configuration
//! - Byte staging and output queueing
//! - The stream controller driving the DSP pipeline

pub mod buffer;
pub mod config;
pub mod stream;

pub use buffer::{decode_samples, encode_samples, SampleBuffer};
pub use config::StreamConfig;
pub use stream::{process_samples, Stream};
