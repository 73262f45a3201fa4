//! Sonance CLI - Streaming Speed and Pitch Modification
//!
//! Command-line interface for the Sonance engine.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use sonance::cli::commands;
use sonance::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Sonance v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Sonance v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Process(args) => {
            let summary = commands::process_file(&args)
                .with_context(|| format!("failed to process {}", args.input.display()))?;
            println!(
                "Wrote {} ({} frames in, {} frames out)",
                args.output.display(),
                summary.frames_in,
                summary.frames_out
            );
        }
        Commands::Tone(args) => {
            commands::generate_tone(&args)
                .with_context(|| format!("failed to write {}", args.output.display()))?;
            println!("Wrote {}", args.output.display());
        }
    }
    Ok(())
}
