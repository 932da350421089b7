use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

mod analyzer;
mod config;
mod metadata;
mod models;
mod progress;
mod recommend;
mod report;
mod summary;

use analyzer::{GeminiClient, ImageAnalyzer, OfflineModel, SummaryModel, VisionModel};
use config::ModelConfig;
use models::{ImageRecord, ProjectDetails, RunReport};

#[derive(Parser)]
#[command(name = "site-progress")]
#[command(about = "Estimate construction progress from dated satellite images", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides the bare level in RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every image and write a progress report
    Analyze {
        /// Image catalog (.json or .csv); the built-in sample catalog when omitted
        #[arg(long)]
        metadata: Option<PathBuf>,
        #[arg(long, default_value = "unknown")]
        project_name: String,
        #[arg(long, default_value = "construction project")]
        project_type: String,
        /// Skip the hosted model and simulate every analysis
        #[arg(long)]
        offline: bool,
        /// Seed for simulated analyses
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[arg(long)]
        model: Option<String>,
        /// Also request an executive summary
        #[arg(long)]
        summary: bool,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        /// Print the full run as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// List the images in a catalog
    Images {
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Recommend follow-up imagery for a project type
    Recommend {
        #[arg(long)]
        project_type: String,
        /// Current overall progress in percent
        #[arg(long)]
        progress: Option<f64>,
    },
}

fn parse_level(level: Option<&str>) -> Option<tracing::Level> {
    let level = level?.to_uppercase();
    let parsed = match level.as_str() {
        "TRACE" => tracing::Level::TRACE,
        "DEBUG" => tracing::Level::DEBUG,
        "INFO" => tracing::Level::INFO,
        "WARN" | "WARNING" => tracing::Level::WARN,
        "ERROR" => tracing::Level::ERROR,
        _ => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", level);
            tracing::Level::INFO
        }
    };
    Some(parsed)
}

/// RUST_LOG directives, defaulting to INFO. An explicit `--log-level`
/// replaces only the bare level; per-target directives stay.
fn log_directives(cli_level: Option<tracing::Level>, rust_log: &str) -> String {
    let is_bare_level = |directive: &&str| directive.parse::<LevelFilter>().is_ok();
    let mut directives: Vec<String> = rust_log
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .filter(|d| cli_level.is_none() || !is_bare_level(d))
        .map(str::to_string)
        .collect();

    if let Some(level) = cli_level {
        directives.insert(0, level.to_string().to_lowercase());
    }
    if directives.is_empty() {
        directives.push("info".to_string());
    }
    directives.join(",")
}

fn setup_logging(level: Option<&str>) {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_default();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(log_directives(parse_level(level), &rust_log)))
        .init();
}

fn load_catalog(path: Option<&PathBuf>) -> anyhow::Result<Vec<ImageRecord>> {
    match path {
        Some(path) => metadata::load_records(path)
            .with_context(|| format!("failed to load image catalog {}", path.display())),
        None => metadata::sample_records(),
    }
}

fn select_models(config: &ModelConfig, offline: bool) -> (Arc<dyn VisionModel>, Arc<dyn SummaryModel>) {
    if !offline {
        match GeminiClient::from_config(config) {
            Ok(client) => {
                let client = Arc::new(client);
                let vision: Arc<dyn VisionModel> = client.clone();
                let summary: Arc<dyn SummaryModel> = client;
                return (vision, summary);
            }
            Err(err) => warn!(error = %err, "hosted model not configured, every analysis will be simulated"),
        }
    }
    let vision: Arc<dyn VisionModel> = Arc::new(OfflineModel);
    let summary: Arc<dyn SummaryModel> = Arc::new(OfflineModel);
    (vision, summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref());

    match cli.command {
        Commands::Analyze {
            metadata,
            project_name,
            project_type,
            offline,
            seed,
            timeout_secs,
            model,
            summary,
            out,
            json,
        } => {
            let config = ModelConfig::from_env()
                .context("invalid model configuration")?
                .with_overrides(model, timeout_secs)?;
            let records = load_catalog(metadata.as_ref())?;
            let project = ProjectDetails {
                name: project_name,
                project_type,
            };
            info!(images = records.len(), project = %project.name, "starting analysis");

            let (vision, summarizer) = select_models(&config, offline);
            let mut image_analyzer = ImageAnalyzer::new(vision, project.clone(), config.timeout, seed);
            let results = image_analyzer.analyze_all(&records).await;

            let consolidated = progress::consolidate(&results);
            let recommendation = recommend::recommend_specs(
                &project.project_type,
                Some(consolidated.overall_progress_percent),
            );
            let executive = if summary {
                Some(
                    summary::executive_summary(
                        summarizer.as_ref(),
                        config.timeout,
                        &project,
                        &consolidated,
                        &recommendation,
                    )
                    .await,
                )
            } else {
                None
            };

            let run = RunReport {
                project,
                report: consolidated,
                recommendation,
                summary: executive,
            };

            std::fs::write(&out, report::build_report(&run))
                .with_context(|| format!("failed to write {}", out.display()))?;

            if json {
                println!("{}", report::render_json(&run)?);
            } else {
                println!(
                    "Overall progress {:.1}% across {} images.",
                    run.report.overall_progress_percent,
                    run.report.timeline.len()
                );
                println!("Report written to {}.", out.display());
            }
        }
        Commands::Images { metadata } => {
            let records = load_catalog(metadata.as_ref())?;
            if records.is_empty() {
                println!("No images found in this catalog.");
                return Ok(());
            }

            println!("Images in catalog order:");
            for record in records.iter() {
                println!("{}", report::format_record(record));
            }
        }
        Commands::Recommend {
            project_type,
            progress,
        } => {
            let specs = recommend::recommend_specs(&project_type, progress);
            println!("Recommended imagery for {project_type}:");
            println!("- frequency: {}", specs.frequency);
            println!("- resolution: {}", specs.resolution);
            println!("- spectral bands: {}", specs.spectral_bands.join(", "));
        }
    }

    Ok(())
}
