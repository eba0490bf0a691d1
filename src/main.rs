//! Fukikae - Automated Video Dubbing
//!
//! Entry point for the fukikae binary. Takes video files through the full
//! dubbing pipeline: audio extraction, transcription, translation, speech
//! synthesis and muxing the dubbed track back onto the original video.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use fukikae::cli::{Args, Commands};
use fukikae::config::Config;
use fukikae::doctor::check_dependencies;
use fukikae::job::JobStatus;
use fukikae::pipeline::Pipeline;
use fukikae::progress::{channel_progress, ProgressUpdate};
use fukikae::scheduler::{BatchScheduler, FocusHandle, StatusCallback};

const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let mut config = Config::load(args.config.as_deref())?;

    match args.command {
        Commands::Process {
            input,
            output_dir,
            source_lang,
            target_lang,
            voice,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(lang) = source_lang {
                config.source_lang = lang;
            }
            if let Some(lang) = target_lang {
                config.target_lang = lang;
            }
            if let Some(voice) = voice {
                config.tts.voice = voice;
            }

            process_single(config, &input).await?;
        }
        Commands::Batch {
            input_dir,
            output_dir,
            concurrency,
            target_lang,
        } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if let Some(lang) = target_lang {
                config.target_lang = lang;
            }

            process_batch(config, &input_dir, concurrency).await?;
        }
        Commands::Check => {
            run_check(&config);
        }
    }

    Ok(())
}

/// Run a single video through the dubbing pipeline with a live progress bar.
async fn process_single(config: Config, input: &Path) -> Result<()> {
    info!("Processing video file: {}", input.display());

    let pipeline = Pipeline::new(config)?;
    let mut job = pipeline.create_job(input);
    pipeline.validate_job(&job)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = channel_progress(tx);
    let bar = spawn_progress_bar(rx);

    let result = pipeline.process(&mut job, &progress).await;

    // Dropping the last sender closes the channel and lets the bar task exit
    drop(progress);
    bar.await?;

    result?;
    if let Some(output) = &job.output_path {
        println!("Dubbed video written to {}", output.display());
    }
    info!("Job {} completed successfully", job.id);

    Ok(())
}

/// Dub every video file under `input_dir`, running up to `concurrency` jobs
/// at once.
async fn process_batch(config: Config, input_dir: &Path, concurrency: usize) -> Result<()> {
    if !input_dir.is_dir() {
        anyhow::bail!("Input path is not a directory: {}", input_dir.display());
    }

    let video_files = find_video_files(input_dir);
    if video_files.is_empty() {
        println!("No video files found in {}", input_dir.display());
        return Ok(());
    }
    info!("Found {} video files to process", video_files.len());

    let pipeline = Arc::new(Pipeline::new(config)?);

    let mut jobs = Vec::new();
    for path in &video_files {
        let mut job = pipeline.create_job(path);
        if let Err(e) = pipeline.validate_job(&job) {
            warn!("Job for {} failed validation: {}", path.display(), e);
            job.fail(e.to_string())?;
        }
        jobs.push(job);
    }

    // Show live progress for the first runnable job; the rest report through
    // the aggregated status lines.
    let focus = FocusHandle::new();
    if let Some(first) = jobs.iter().find(|j| j.status == JobStatus::Pending) {
        focus.focus(first.id);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = channel_progress(tx);
    let bar = spawn_progress_bar(rx);

    let on_status: StatusCallback = Arc::new(|line: String| {
        println!("{}", line);
    });

    let scheduler = BatchScheduler::new(Arc::clone(&pipeline), concurrency);
    let report = scheduler.run(jobs, &focus, &progress, &on_status).await;

    drop(progress);
    bar.await?;

    println!(
        "Batch complete: {} of {} jobs succeeded",
        report.completed,
        report.jobs.len()
    );
    if !report.failed.is_empty() {
        println!("Failed jobs:");
        for (id, cause) in &report.failed {
            let name = report
                .jobs
                .iter()
                .find(|j| j.id == *id)
                .map(|j| j.file_name())
                .unwrap_or_else(|| id.to_string());
            println!("  {:<30} {}", name, cause);
        }
        anyhow::bail!("{} of {} jobs failed", report.failed.len(), report.jobs.len());
    }

    Ok(())
}

/// Print an availability report for every external tool the current
/// configuration relies on.
fn run_check(config: &Config) {
    let report = check_dependencies(config);

    println!("\nDependency Check:");
    println!("{:<28} {:<12} {}", "Tool", "Status", "Details");
    println!("{}", "-".repeat(70));

    let mut missing = 0;
    for (tool, probe) in &report {
        match probe {
            None => println!("{:<28} {:<12}", tool, "Available"),
            Some(message) => {
                missing += 1;
                println!("{:<28} {:<12} {}", tool, "Missing", message);
            }
        }
    }

    if missing == 0 {
        println!("\nAll dependencies are available.");
    } else {
        println!("\n{} dependencies need attention.", missing);
    }
}

/// Collect video files under `input_dir`, recursively, in a stable order.
fn find_video_files(input_dir: &Path) -> Vec<PathBuf> {
    let mut video_files = Vec::new();
    for entry in WalkDir::new(input_dir).into_iter().filter_map(|e| e.ok()) {
        if let Some(extension) = entry.path().extension() {
            if let Some(ext_str) = extension.to_str() {
                if VIDEO_EXTENSIONS.contains(&ext_str.to_lowercase().as_str()) {
                    video_files.push(entry.path().to_path_buf());
                }
            }
        }
    }
    video_files.sort();
    video_files
}

/// Render pipeline progress updates on a single bar until the channel closes.
fn spawn_progress_bar(
    mut rx: mpsc::UnboundedReceiver<ProgressUpdate>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {prefix:<13} {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }

        while let Some(update) = rx.recv().await {
            bar.set_prefix(update.stage.label());
            bar.set_position(update.percent as u64);
            bar.set_message(update.message);
        }
        bar.finish_and_clear();
    })
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let fukikae_dir = std::env::current_dir()?.join(".fukikae");
    let log_dir = fukikae_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "fukikae.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console output stays compact so it does not fight the progress bar
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("fukikae.log").display()
    );

    Ok(())
}
