// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod devices;
mod error;
mod formats;
mod gpio;
mod snap;
mod utils;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;

/// rpi-hwio CLI - GPIO pin control and V4L2 frame capture
#[derive(Parser)]
#[command(name = "rpi-hwio")]
#[command(version)]
#[command(about = "rpi-hwio CLI - GPIO pin control and V4L2 frame capture")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=debug for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output results in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List V4L2 capture nodes
    Devices(devices::Args),

    /// List the pixel formats a capture node offers
    Formats(formats::Args),

    /// Capture frames to a raw file
    Snap(snap::Args),

    /// Read, write and configure GPIO pins
    Gpio(gpio::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Devices(args) => devices::execute(args, cli.json),
        Commands::Formats(args) => formats::execute(args, cli.json),
        Commands::Snap(args) => snap::execute(args, cli.json),
        Commands::Gpio(args) => gpio::execute(args, cli.json),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
