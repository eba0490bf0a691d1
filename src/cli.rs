use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::scheduler::DEFAULT_BATCH_CONCURRENCY;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dub a single video file into the target language
    Process {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the dubbed video
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Source language code, or "auto" for detection
        #[arg(short, long)]
        source_lang: Option<String>,

        /// Target language code
        #[arg(short, long)]
        target_lang: Option<String>,

        /// Voice identifier for speech synthesis
        #[arg(long)]
        voice: Option<String>,
    },

    /// Dub every video file found in a directory
    Batch {
        /// Input directory, scanned recursively for video files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory for dubbed videos
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// How many jobs to run at once
        #[arg(long, default_value_t = DEFAULT_BATCH_CONCURRENCY)]
        concurrency: usize,

        /// Target language code
        #[arg(short, long)]
        target_lang: Option<String>,
    },

    /// Check that the configured external tools are available
    Check,
}
