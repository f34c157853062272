// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "scanner")]
#[command(about = "Stable barcode scanning from noisy camera frames")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a raw I420 frame dump to PNG
    Convert {
        /// Raw planar YUV 4:2:0 file (Y, then U, then V; tightly packed)
        #[arg(short, long)]
        input: PathBuf,

        /// Frame width in pixels
        #[arg(long)]
        width: u32,

        /// Frame height in pixels
        #[arg(long)]
        height: u32,

        /// Sensor rotation in degrees (0, 90, 180, 270)
        #[arg(short, long, default_value = "0")]
        rotation: i32,

        /// Output file path (default: ./frame_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Scan still images as if they were camera frames
    Scan {
        /// Image files or directories of images
        #[arg(required = true)]
        input: Vec<PathBuf>,

        /// Frames submitted per second
        #[arg(long, default_value = "10")]
        fps: u32,

        /// Frames submitted for each image
        #[arg(long, default_value = "10")]
        frames: u32,

        /// Configuration file (default: user configuration)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Replay a detection script against the stabilizer in virtual time
    Simulate {
        /// JSON array of {"value": "...", "t": <ms>} entries
        script: PathBuf,

        /// Voting window in milliseconds
        #[arg(long, default_value = "1000")]
        window_ms: u64,

        /// Tick period in milliseconds
        #[arg(long, default_value = "1000")]
        tick_ms: u64,

        /// Do not re-insert the winning value on each tick
        #[arg(long)]
        no_self_refresh: bool,
    },

    /// Show the effective configuration
    Config {
        /// Only print the configuration file path
        #[arg(long)]
        path: bool,

        /// Write a default configuration file if none exists
        #[arg(long, conflicts_with = "path")]
        init: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=scanner=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            width,
            height,
            rotation,
            output,
        } => cli::convert_frame(input, width, height, rotation, output),
        Commands::Scan {
            input,
            fps,
            frames,
            config,
        } => cli::scan_images(input, fps, frames, config),
        Commands::Simulate {
            script,
            window_ms,
            tick_ms,
            no_self_refresh,
        } => cli::simulate(script, window_ms, tick_ms, !no_self_refresh),
        Commands::Config { path, init } => cli::show_config(path, init),
    }
}
