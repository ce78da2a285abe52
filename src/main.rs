// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! photo-finder: Local Face-Matching Photo Finder
//!
//! Register your face, point the scanner at a folder of event photos, and keep
//! the ones you are in.

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use photo_finder::config::AppConfig;
use photo_finder::db::Database;
use photo_finder::engine::FaceModel;
use photo_finder::export::export_photos;
use photo_finder::history::{History, ScanRecord};
use photo_finder::registration::{register_face, Angle, ReferenceSet};
use photo_finder::scanner::{ScanOptions, ScanSummary, Scanner};
use photo_finder::similarity::Classifier;
use photo_finder::source::{collect_images, SelectOptions};
use photo_finder::{FinderError, Result};

/// photo-finder CLI - find your face in a folder of photos
#[derive(Parser, Debug)]
#[command(name = "photo-finder")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Find the photos you appear in, locally", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a reference face (front, then left, then right)
    Register {
        /// Photo showing your face
        image: PathBuf,

        /// Angle of this photo (defaults to the next one expected)
        #[arg(short, long)]
        angle: Option<Angle>,

        /// Drop previously registered faces first
        #[arg(long)]
        reset: bool,
    },

    /// Registered reference faces
    References {
        #[command(subcommand)]
        action: ReferenceCommands,
    },

    /// Scan a folder and keep the photos that match your face
    Scan {
        /// Folder of photos
        dir: PathBuf,

        /// Include subfolders
        #[arg(short, long)]
        recursive: bool,

        /// Only scan files matching these glob patterns
        #[arg(short, long)]
        include: Vec<String>,

        /// Similarity threshold (0-100, overrides config)
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Matched photo cache
    Matches {
        #[command(subcommand)]
        action: MatchCommands,
    },

    /// Past scans
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show face engine and cache status
    Status,
}

#[derive(Subcommand, Debug)]
enum ReferenceCommands {
    /// List registered faces
    Show,

    /// Forget all registered faces
    Clear,
}

#[derive(Subcommand, Debug)]
enum MatchCommands {
    /// List matched photos
    List,

    /// Copy matched photos into a folder
    Export {
        /// Output folder
        output: PathBuf,

        /// Only these photo ids (default: all)
        #[arg(long = "id")]
        ids: Vec<String>,
    },

    /// Delete one matched photo
    Delete {
        id: String,
    },

    /// Delete all matched photos
    Clear {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent scans
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Clear scan history
    Clear {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;
    let json = cli.format == "json";

    match cli.command {
        Commands::Register { image, angle, reset } => run_register(config, image, angle, reset).await,
        Commands::References { action } => run_references(config, action, json),
        Commands::Scan { dir, recursive, include, threshold } => {
            run_scan(config, dir, recursive, include, threshold, json, cli.quiet).await
        }
        Commands::Matches { action } => run_matches(config, action, json),
        Commands::History { action } => run_history(config, action, json),
        Commands::Config { action } => run_config(config, action, &cli.config),
        Commands::Status => run_status(config).await,
    }
}

/// Register one reference face
async fn run_register(config: AppConfig, image: PathBuf, angle: Option<Angle>, reset: bool) -> Result<()> {
    let path = PathBuf::from(&config.references.path);
    let mut references = if reset { ReferenceSet::new() } else { ReferenceSet::load(&path)? };

    let angle = match angle.or_else(|| references.next_angle()) {
        Some(a) => a,
        None => {
            return Err(FinderError::Reference(
                "All three angles are registered. Use --reset to start over".to_string(),
            ))
        }
    };

    let model = FaceModel::from_config(&config)?;
    let face = register_face(&model, &image, angle).await?;
    references.push(face)?;
    references.save(&path)?;

    println!("Registered {} face ({}/3)", angle, references.len());
    match references.next_angle() {
        Some(next) => println!("Next: {} - {}", next, next.hint()),
        None => println!("All angles registered. Run: photo-finder scan <folder>"),
    }

    Ok(())
}

fn run_references(config: AppConfig, action: ReferenceCommands, json: bool) -> Result<()> {
    let path = PathBuf::from(&config.references.path);

    match action {
        ReferenceCommands::Show => {
            let references = ReferenceSet::load(&path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&references)?);
                return Ok(());
            }
            println!("Registered faces ({}/3):", references.len());
            for face in references.faces() {
                println!(
                    "  {:<5} {} ({})",
                    face.angle,
                    face.source.display(),
                    face.registered_at.format("%Y-%m-%d %H:%M")
                );
            }
            if let Some(next) = references.next_angle() {
                println!("Next: {} - {}", next, next.hint());
            }
        }
        ReferenceCommands::Clear => {
            let mut references = ReferenceSet::load(&path)?;
            let removed = references.len();
            references.clear();
            references.save(&path)?;
            println!("Cleared {} reference face(s)", removed);
        }
    }

    Ok(())
}

/// Scan a folder against the registered faces
async fn run_scan(
    mut config: AppConfig,
    dir: PathBuf,
    recursive: bool,
    include: Vec<String>,
    threshold: Option<f32>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    if recursive {
        config.scan.recursive = true;
    }
    if !include.is_empty() {
        config.scan.include = include;
    }
    if let Some(t) = threshold {
        config.matching.threshold = t;
    }
    config.validate()?;

    let references = ReferenceSet::load(Path::new(&config.references.path))?;
    if references.is_empty() {
        return Err(FinderError::Reference(
            "No reference faces registered. Run: photo-finder register <photo>".to_string(),
        ));
    }
    references.check_descriptor_len(config.engine.descriptor_len)?;
    if !references.is_complete() {
        warn!("Only {} of 3 angles registered; matching may miss photos", references.len());
    }

    let selection = collect_images(&dir, &SelectOptions::from_config(&config.scan))?;
    info!("Scanning {} image(s) in {:?}", selection.images.len(), dir);

    let db = Database::open(&config.database.path)?;
    let model = FaceModel::from_config(&config)?;
    let classifier = Classifier::new(config.matching.threshold);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping after the current photo...");
            let _ = shutdown_tx.send(true);
        }
    });

    let scanner = Scanner::new(&model, &db, classifier)
        .with_options(ScanOptions::from_config(&config))
        .with_shutdown(shutdown_rx);

    let started_at = Utc::now();
    let mut last_reported = None;
    let summary = scanner
        .process_photos(&selection.images, &references.descriptors(), |status| {
            if quiet || json || !status.is_processing || last_reported == Some(status.processed) {
                return;
            }
            last_reported = Some(status.processed);
            eprint!(
                "\r[{:>3}%] {}/{} processed, {} found  ",
                status.progress, status.processed, status.total, status.match_count
            );
        })
        .await?;
    if !quiet && !json {
        eprintln!();
    }

    let history = History::new(PathBuf::from(&config.history.path));
    let record = ScanRecord::from_summary(&dir, config.matching.threshold, started_at, &summary);
    if let Err(e) = history.append(&record) {
        warn!("Failed to write scan history: {}", e);
    }

    print_summary(&summary, json)
}

fn print_summary(summary: &ScanSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    for m in &summary.matches {
        let note = if m.id.is_none() { " (already saved)" } else { "" };
        println!("{}: {:.1}{}", m.path.display(), m.similarity, note);
    }

    println!();
    println!(
        "{}{} of {} photos processed, {} found, {} without a face, {} failed",
        if summary.cancelled { "Cancelled: " } else { "" },
        summary.processed,
        summary.total,
        summary.matched,
        summary.no_face,
        summary.failed
    );

    Ok(())
}

fn run_matches(config: AppConfig, action: MatchCommands, json: bool) -> Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        MatchCommands::List => {
            let photos = db.list_photos()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&photos)?);
                return Ok(());
            }
            println!("Found photos ({}):", photos.len());
            for photo in photos {
                println!(
                    "  {}  {:>5.1}  {}  {}",
                    photo.id,
                    photo.similarity,
                    photo.created_at.format("%Y-%m-%d %H:%M"),
                    photo.filename
                );
            }
        }
        MatchCommands::Export { output, ids } => {
            let photos: Vec<_> = db
                .get_all_photos()?
                .into_iter()
                .filter(|p| ids.is_empty() || ids.contains(&p.id))
                .collect();

            if photos.is_empty() {
                println!("Nothing to export");
                return Ok(());
            }

            let written = export_photos(&photos, &output)?;
            println!("Exported {} photo(s) to {:?}", written.len(), output);
        }
        MatchCommands::Delete { id } => {
            if !db.delete_photo(&id)? {
                return Err(FinderError::PhotoNotFound(id));
            }
            println!("Deleted {}", id);
        }
        MatchCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm deleting all found photos");
                return Ok(());
            }
            let removed = db.clear()?;
            db.vacuum()?;
            println!("Deleted {} photo(s)", removed);
        }
    }

    Ok(())
}

fn run_history(config: AppConfig, action: HistoryCommands, json: bool) -> Result<()> {
    let history = History::new(PathBuf::from(&config.history.path));

    match action {
        HistoryCommands::List { count } => {
            let records = history.get_recent(count)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }
            println!("Recent scans ({} entries):", records.len());
            for record in records {
                let status = if record.cancelled { "[CANCELLED]" } else { "" };
                println!(
                    "  {} {} - {}/{} processed, {} found {}",
                    record.started_at.format("%Y-%m-%d %H:%M"),
                    record.folder.display(),
                    record.processed,
                    record.total,
                    record.matched,
                    status
                );
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            history.clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}

fn run_config(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Face engine: {} ({})", config.engine.url, config.engine.model);
            println!("  Threshold: {}", config.matching.threshold);
            println!("  Database: {}", config.database.path);
        }
    }

    Ok(())
}

/// Show engine and cache status
async fn run_status(config: AppConfig) -> Result<()> {
    let model = FaceModel::from_config(&config)?;
    let client = model.client();

    println!("photo-finder v1.0.0 Status");
    println!("==========================");

    match client.health_check().await {
        Ok(()) => println!("Face engine: Running ({})", client.base_url()),
        Err(e) => println!("Face engine: Error - {}", e),
    }

    match client.list_models().await {
        Ok(models) => {
            println!("\nAvailable models:");
            for m in &models {
                let marker = if m.starts_with(client.model()) { "→" } else { " " };
                println!("  {} {}", marker, m);
            }
        }
        Err(e) => println!("  Error listing models: {}", e),
    }

    match ReferenceSet::load(Path::new(&config.references.path)) {
        Ok(references) => println!("\nReference faces: {}/3", references.len()),
        Err(e) => println!("\nReference faces: Error - {}", e),
    }

    match Database::open(&config.database.path) {
        Ok(db) => {
            let stats = db.stats()?;
            println!("\nCache ({}):", config.database.path);
            println!("  Photos: {}", stats.photo_count);
            println!("  Size: {} KiB", stats.total_bytes / 1024);
        }
        Err(e) => println!("\nCache: Error - {}", e),
    }

    println!("\nMatch threshold: {}", config.matching.threshold);

    Ok(())
}
