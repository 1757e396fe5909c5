//! # CLI Module
//!
//! Command-line interface for the photo culler.
//!
//! ## Usage
//! ```bash
//! # Find exact duplicates
//! photo-cull analyze ~/Photos
//!
//! # Also merge near-identical shots
//! photo-cull analyze ~/Photos --mode ai --similarity-threshold 0.85
//!
//! # Transitive grouping, JSON output
//! photo-cull analyze ~/Photos --grouping transitive --output json
//!
//! # Settings from a file; flags still win
//! photo-cull analyze ~/Photos --config culler.json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_culler::core::comparator::GroupingStrategy;
use photo_culler::core::consolidator::GroupKind;
use photo_culler::core::pipeline::{AnalysisMode, AnalysisResult, Pipeline, PipelineConfig};
use photo_culler::core::scanner::{ScanConfig, WalkDirScanner};
use photo_culler::core::session::{AnalysisTask, SessionStatus, SessionStore};
use photo_culler::core::similarity::BackendKind;
use photo_culler::core::source::FileSystemSource;
use photo_culler::error::{CullerError, Result};
use photo_culler::events::{CompareEvent, Event, EventChannel, PipelineEvent, QualityEvent};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

/// Photo Culler - group duplicate and near-duplicate shots, keep the best
#[derive(Parser, Debug)]
#[command(name = "photo-cull")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse photos and group duplicates
    Analyze {
        /// Files or directories to analyse
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Analysis mode
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Pixel similarity needed for an exact duplicate (0-1)
        #[arg(long)]
        duplicate_threshold: Option<f64>,

        /// Embedding similarity needed to merge groups in AI mode (0-1)
        #[arg(long)]
        similarity_threshold: Option<f64>,

        /// How matches are chained into groups
        #[arg(short, long)]
        grouping: Option<Grouping>,

        /// Embedding backend for AI mode
        #[arg(short, long)]
        backend: Option<Backend>,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Include hidden files
        #[arg(long)]
        include_hidden: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// JSON settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Exact pixel duplicates only
    Pixel,
    /// Exact duplicates, then merge look-alike groups
    Ai,
}

impl From<Mode> for AnalysisMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Pixel => AnalysisMode::Pixel,
            Mode::Ai => AnalysisMode::Ai,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Grouping {
    /// Compare each photo with the group's first photo (default)
    SeedOnly,
    /// Join every chain of matches
    Transitive,
}

impl From<Grouping> for GroupingStrategy {
    fn from(grouping: Grouping) -> Self {
        match grouping {
            Grouping::SeedOnly => GroupingStrategy::SeedOnly,
            Grouping::Transitive => GroupingStrategy::Transitive,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// Luma histogram (default)
    Histogram,
    /// Coarse colour layout
    ColorLayout,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Histogram => BackendKind::Histogram,
            Backend::ColorLayout => BackendKind::ColorLayout,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (redundant paths only)
    Minimal,
}

/// Contents of a `--config` file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    pipeline: PipelineConfig,
    scan: ScanConfig,
}

impl SettingsFile {
    fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            CullerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            CullerError::Config(format!("Invalid settings in {}: {}", path.display(), e))
        })
    }
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            paths,
            mode,
            duplicate_threshold,
            similarity_threshold,
            grouping,
            backend,
            output,
            include_hidden,
            verbose,
            config,
        } => {
            let mut settings = match config {
                Some(ref path) => SettingsFile::load(path)?,
                None => SettingsFile::default(),
            };

            let pipeline = &mut settings.pipeline;
            if let Some(mode) = mode {
                pipeline.mode = mode.into();
            }
            if let Some(threshold) = duplicate_threshold {
                pipeline.duplicate_threshold = threshold;
            }
            if let Some(threshold) = similarity_threshold {
                pipeline.similarity_threshold = threshold;
            }
            if let Some(grouping) = grouping {
                pipeline.grouping = grouping.into();
            }
            if let Some(backend) = backend {
                pipeline.backend = backend.into();
            }
            if include_hidden {
                settings.scan.include_hidden = true;
            }

            run_analyze(paths, settings, output, verbose)
        }
    }
}

fn run_analyze(
    paths: Vec<PathBuf>,
    settings: SettingsFile,
    output: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();
    let pretty = matches!(output, OutputFormat::Pretty);

    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Photo Culler").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let pipeline = Arc::new(Pipeline::builder().config(settings.pipeline).build()?);

    let scan = WalkDirScanner::new(settings.scan).scan(&paths);
    if verbose {
        for skipped in &scan.skipped {
            term.write_line(&format!("  {} {}", style("skipped").yellow(), skipped))
                .ok();
        }
    }

    let store = Arc::new(SessionStore::new());
    let session = store.create()?;

    let (sender, receiver) = EventChannel::new();

    // Progress bar for pretty output
    let progress = if pretty {
        let pb = ProgressBar::new(scan.images.len() as u64);
        if let Ok(bar_style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("█▓░"));
        }
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Quality(QualityEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                }
                Event::Quality(QualityEvent::Unreadable { content, .. }) if verbose => {
                    pb.println(format!("  {} {}", style("unreadable").red(), content));
                }
                Event::Compare(CompareEvent::Progress(p)) => {
                    pb.set_length(p.total_items as u64);
                    pb.set_position(p.items_grouped as u64);
                }
                Event::Pipeline(PipelineEvent::Completed { .. })
                | Event::Pipeline(PipelineEvent::Error { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let handle = AnalysisTask::spawn_with_events(
        Arc::clone(&store),
        session,
        pipeline,
        scan.images,
        Arc::new(FileSystemSource::new()),
        sender,
    )?;
    let status = handle.join()?;
    event_thread.join().ok();

    if status == SessionStatus::Failed {
        let snapshot = store.snapshot(session)?;
        return Err(CullerError::AnalysisFailed(
            snapshot.error.unwrap_or_else(|| "unknown failure".to_string()),
        ));
    }

    let result = store.result(session)?.ok_or_else(|| {
        CullerError::AnalysisFailed(format!("session {} has no result", session))
    })?;

    match output {
        OutputFormat::Pretty => print_pretty_results(&term, &result, verbose),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result.as_ref())?),
        OutputFormat::Minimal => print_minimal_results(&result),
    }

    Ok(())
}

fn print_pretty_results(term: &Term, result: &AnalysisResult, verbose: bool) {
    if !result.success {
        term.write_line(&format!(
            "{} {}",
            style("✗").red().bold(),
            result.error.as_deref().unwrap_or("Analysis failed")
        ))
        .ok();
        return;
    }

    term.write_line(&format!("{} Analysis Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    if let Some(stats) = &result.statistics {
        term.write_line(&format!(
            "  {} photos analysed in {:.1}s",
            style(stats.total_images).cyan(),
            result.duration_ms as f64 / 1000.0
        ))
        .ok();
        term.write_line(&format!(
            "  {} groups: {} duplicate, {} similar, {} unique",
            style(stats.total_groups).cyan(),
            stats.duplicate_count,
            stats.similar_count,
            stats.unique_count
        ))
        .ok();
        term.write_line(&format!(
            "  {} potential space savings",
            style(format_bytes(stats.estimated_space_saved_bytes)).yellow()
        ))
        .ok();
    }

    term.write_line("").ok();

    let redundant: Vec<_> = result.redundant_groups().collect();
    if redundant.is_empty() {
        term.write_line("  No duplicates found!").ok();
    } else {
        term.write_line(&format!("{}", style("Groups:").bold().underlined()))
            .ok();
        term.write_line("").ok();

        for group in redundant {
            let kind = match group.kind {
                GroupKind::Similar => style(group.kind.as_str()).magenta(),
                _ => style(group.kind.as_str()).yellow(),
            };
            term.write_line(&format!(
                "  {} {} ({} photos, similarity {:.2}, {})",
                style(format!("{}:", group.id)).bold(),
                kind,
                group.count,
                group.similarity_score,
                format_bytes(group.space_saved_bytes)
            ))
            .ok();

            for member in &group.images {
                let marker = if member.index == group.best_image.index {
                    style("★").green().to_string()
                } else {
                    style("○").dim().to_string()
                };
                let detail = if verbose {
                    format!(
                        "  {}",
                        style(format!("quality {:.3}", member.quality.overall_score)).dim()
                    )
                } else {
                    String::new()
                };
                term.write_line(&format!("    {} {}{}", marker, member.path, detail))
                    .ok();
            }

            term.write_line("").ok();
        }
    }

    term.write_line(&format!(
        "{}",
        style("No files were deleted. Keep the starred (★) photo of each group.").dim()
    ))
    .ok();
}

fn print_minimal_results(result: &AnalysisResult) {
    for group in result.redundant_groups() {
        for member in &group.images {
            if member.index != group.best_image.index {
                println!("{}", member.path);
            }
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
