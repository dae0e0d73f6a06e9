//! Command-line interface definition.
//!
//! Parsing only; command handling lives in `main.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "scriv",
    version,
    about = "Offline batch transcription for long audio recordings"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Suppress status messages
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add audio files to the transcription queue
    Add {
        /// WAV files to queue
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Process pending records until the queue is empty
    Run {
        /// Whisper model to use (overrides config)
        #[arg(long)]
        model: Option<String>,

        /// Language hint, or "auto" (overrides config)
        #[arg(long)]
        language: Option<String>,

        /// Inference thread budget (overrides config)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// List transcript records
    List,

    /// Print a record's transcript
    Show {
        /// Record id (or unique prefix)
        id: String,
    },

    /// Cancel a pending record
    Cancel {
        /// Record id (or unique prefix)
        id: String,
    },

    /// Manage Whisper models
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelsAction {
    /// List available and installed models
    List,
    /// Download and install a model
    Install {
        /// Model name, e.g. "base.en"
        name: String,
    },
    /// Delete an installed model
    Remove {
        /// Model name, e.g. "base.en"
        name: String,
    },
    /// Print the models cache directory
    Dir,
}
