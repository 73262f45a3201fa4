//! CLI Module
//!
//! Command-line driver that streams WAV files through a [`Stream`](crate::Stream).

pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Sonance - change the speed, pitch and rate of 16-bit WAV audio
#[derive(Parser, Debug)]
#[command(name = "sonance")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream a WAV file through the engine
    #[command(name = "process")]
    Process(ProcessArgs),

    /// Write a sine test tone as a 16-bit WAV file
    #[command(name = "tone")]
    Tone(ToneArgs),
}

/// Options for the `process` command
#[derive(Args, Debug, Clone, Default)]
pub struct ProcessArgs {
    /// Input 16-bit PCM WAV file
    pub input: PathBuf,

    /// Output WAV file
    pub output: PathBuf,

    /// JSON preset with any StreamConfig fields; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Speed factor (2.0 = twice as fast, same pitch)
    #[arg(short, long)]
    pub speed: Option<f32>,

    /// Pitch factor (2.0 = one octave up, same duration)
    #[arg(short, long)]
    pub pitch: Option<f32>,

    /// Rate factor (2.0 = twice as fast and one octave up)
    #[arg(short, long)]
    pub rate: Option<f32>,

    /// Output volume (1.0 = unchanged)
    #[arg(long)]
    pub volume: Option<f32>,

    /// Harmonize the pitch-shifted output as a major triad
    #[arg(long)]
    pub chord: bool,

    /// Search pitch periods at full rate
    #[arg(short, long)]
    pub quality: bool,

    /// Frames pushed per call, to exercise the streaming path
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,
}

/// Options for the `tone` command
#[derive(Args, Debug, Clone)]
pub struct ToneArgs {
    /// Output WAV file
    pub output: PathBuf,

    /// Tone frequency in Hz
    #[arg(short, long, default_value_t = 440.0)]
    pub frequency: f32,

    /// Duration in seconds
    #[arg(short, long, default_value_t = 1.0)]
    pub duration: f32,

    /// Sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    pub sample_rate: u32,

    /// Number of channels
    #[arg(long, default_value_t = 1)]
    pub channels: u16,
}
