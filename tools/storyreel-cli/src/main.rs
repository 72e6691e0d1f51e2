//! Storyreel CLI: command-line interface for scene assembly and export.
//!
//! Usage:
//!   storyreel check [--save-config]  Check renderer availability
//!   storyreel validate <SCENE>       Validate a scene manifest
//!   storyreel compose <SCENE>        Compose one scene
//!   storyreel concat <CLIPS>... -o   Join composed scenes
//!   storyreel export <VIDEO>         Export a video to several profiles
//!   storyreel render <PROJECT>       Compose, join and export a whole project

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storyreel_common::config::{config_file_path, AppConfig, ResolutionPreset};
use storyreel_scene_model::profile::{ContainerFormat, QualityProfile};

mod commands;

#[derive(Parser)]
#[command(
    name = "storyreel",
    about = "Assemble dialogue scenes into finished videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Directory for finished videos (overrides config)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Working directory for intermediate files (overrides config)
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,

    /// Target resolution: 720p, 1080p, 1440p, 2160p (overrides config)
    #[arg(long, global = true)]
    resolution: Option<ResolutionPreset>,

    /// Output frame rate (overrides config)
    #[arg(long, global = true)]
    fps: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the renderer binaries are available
    Check {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save_config: bool,
    },

    /// Validate a scene manifest and print its timeline
    Validate {
        /// Path to the scene manifest (JSON)
        path: PathBuf,
    },

    /// Compose one scene
    Compose {
        /// Path to the scene manifest (JSON)
        path: PathBuf,
    },

    /// Join composed scene videos in order
    Concat {
        /// Scene videos, in playback order
        #[arg(required = true)]
        clips: Vec<PathBuf>,

        /// Output filename inside the output directory
        #[arg(short, long, default_value = "final.mp4")]
        output: String,

        /// Re-encode with transitions between scenes
        #[arg(long)]
        transitions: bool,
    },

    /// Export a video to every (format, quality) pair
    Export {
        /// Video to export
        path: PathBuf,

        /// Container formats, comma separated
        #[arg(long, value_delimiter = ',', default_value = "mp4")]
        format: Vec<ContainerFormat>,

        /// Quality profiles, comma separated
        #[arg(long, value_delimiter = ',', default_value = "high")]
        quality: Vec<QualityProfile>,

        /// Export directory (defaults to the output directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compose every scene of a project, join them and export
    Render {
        /// Path to the project manifest (JSON)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load();

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    storyreel_common::logging::init_logging(&config.logging);

    let mut assembly = config.assembly;
    if let Some(dir) = cli.output_dir {
        assembly.output_dir = dir;
    }
    if let Some(dir) = cli.temp_dir {
        assembly.temp_dir = dir;
    }
    if let Some(resolution) = cli.resolution {
        assembly.resolution = resolution;
    }
    if let Some(fps) = cli.fps {
        assembly.fps = fps;
    }

    match cli.command {
        Commands::Check { save_config } => {
            if save_config {
                let effective = AppConfig {
                    assembly: assembly.clone(),
                    logging: config.logging.clone(),
                };
                effective.save()?;
                println!("Saved configuration to {}", config_file_path().display());
            }
            commands::check::run(&assembly)
        }
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Compose { path } => commands::compose::run(assembly, path).await,
        Commands::Concat {
            clips,
            output,
            transitions,
        } => commands::concat::run(assembly, clips, output, transitions).await,
        Commands::Export {
            path,
            format,
            quality,
            output,
        } => commands::export::run(assembly, path, format, quality, output).await,
        Commands::Render { path } => commands::render::run(assembly, path).await,
    }
}
