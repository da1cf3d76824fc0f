use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "episodeforge")]
#[command(author, version, about = "Episode production pipeline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Produce an episode from a request file
    Produce {
        /// Request file (TOML, or JSON with a .json extension)
        #[arg(required = true)]
        request: PathBuf,

        /// Override the output path from the request
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory for temporary artifacts
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Override the quality preset
        #[arg(long)]
        quality: Option<String>,

        /// Override the compliance profile
        #[arg(long)]
        profile: Option<String>,

        /// Print the production result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a request file and print its stage plan
    Validate {
        /// Request file to validate
        #[arg(required = true)]
        request: PathBuf,
    },

    /// Probe a media file and check it against a compliance profile
    Check {
        /// File to check
        #[arg(required = true)]
        file: PathBuf,

        /// Compliance profile (defaults to the configured profile)
        #[arg(long)]
        profile: Option<String>,
    },

    /// List quality presets, compliance profiles, transitions and grades
    Presets,

    /// Check that required external tools are available
    CheckTools,

    /// Display version information
    Version,
}
