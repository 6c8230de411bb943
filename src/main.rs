use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use plate_score::cache::ResultCache;
use plate_score::config::{self, Config};
use plate_score::enrich::{self, BusinessEntity, EnrichmentOrchestrator, EnrichmentOutcome};
use plate_score::error::ConfigError;
use plate_score::output;
use plate_score::scoring::{BasePrediction, ScoreFusionEngine};
use plate_score::telemetry;
use plate_score::transport::{HttpTransport, Transport};

const EXIT_SUCCESS: i32 = 0;
const EXIT_INPUT: i32 = 1;
const EXIT_NETWORK: i32 = 2;
const EXIT_CONFIG: i32 = 4;

const DEFAULT_MODEL_VERSION: &str = "external";

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enrich one business and adjust its predicted rating
    Score {
        /// Business name as listed
        name: String,
        /// Street address including city
        address: String,
        /// Base predicted rating (1.0-5.0)
        #[arg(short, long)]
        rating: f64,
        /// Confidence of the base prediction (0.0-1.0)
        #[arg(long, default_value_t = 1.0)]
        confidence: f64,
        #[arg(long, default_value = DEFAULT_MODEL_VERSION)]
        model_version: String,
    },
    /// Look up the health inspection grade of a business
    Health {
        name: String,
        address: String,
    },
    /// Score every business in a tab-separated file (name, address, rating[, confidence])
    Batch {
        file: PathBuf,
    },
    /// Remove cached lookup results
    ClearCache,
}

#[derive(Parser, Debug)]
#[command(name = "plate-score")]
#[command(about = "Adjust restaurant quality predictions with amenity and health inspection data", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/plate-score/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();
    let start_time = Instant::now();

    let config_path = cli.config.map(PathBuf::from);
    let config = match config::load_config(config_path.clone()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(errors) = config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    let filter = telemetry::default_filter(config.log_level.as_deref(), cli.verbose);
    if let Err(e) = telemetry::init(&filter) {
        eprintln!("Logging setup failed: {}", e);
        std::process::exit(EXIT_CONFIG);
    }

    // Logged here because loading runs before the subscriber exists
    let config_path = config_path.unwrap_or_else(config::get_config_path);
    tracing::debug!(path = %config_path.display(), found = config_path.exists(), "Loaded config");

    let cache = ResultCache::from_config(&config.cache);

    if let Commands::ClearCache = cli.command {
        if let Err(e) = cache.clear() {
            eprintln!("Failed to clear cache: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
        println!("Cache cleared");
        std::process::exit(EXIT_SUCCESS);
    }

    let use_colors = !cli.json && output::should_use_colors();

    // Health grades only need the inspection portals, so no places key
    if let Commands::Health { name, address } = &cli.command {
        let extractor = match build_portal_transport(&config)
            .and_then(|portals| enrich::inspection_extractor(&config, portals, cache))
        {
            Ok(extractor) => extractor,
            Err(e) => exit_on_setup_error(e),
        };
        let grade =
            enrich::facility_grade(&extractor, name, address, config.inspections.date_fallback).await;
        match (grade, cli.json) {
            (Some(grade), true) => print_json(&grade),
            (Some(grade), false) => println!("{}", output::format_health(&grade, use_colors)),
            (None, true) => println!("null"),
            (None, false) => println!("No inspection data found for {}", name),
        }
        tracing::info!(elapsed = ?start_time.elapsed(), "Run complete");
        std::process::exit(EXIT_SUCCESS);
    }

    let orchestrator = match build_orchestrator(&config, cache) {
        Ok(o) => o,
        Err(e) => exit_on_setup_error(e),
    };

    match cli.command {
        Commands::Score {
            name,
            address,
            rating,
            confidence,
            model_version,
        } => {
            let entity = BusinessEntity::new(name, address);
            let base = BasePrediction::new(rating, confidence, model_version);
            let outcome = orchestrator.enrich(&entity, &base).await;
            print_outcomes(&[outcome], cli.json, use_colors);
        }
        Commands::Batch { file } => {
            let entities = match read_batch(&file) {
                Ok(e) => e,
                Err(e) => {
                    eprintln!("Input error: {:#}", e);
                    std::process::exit(EXIT_INPUT);
                }
            };
            let outcomes = orchestrator.enrich_batch(entities).await;
            print_outcomes(&outcomes, cli.json, use_colors);
        }
        Commands::Health { .. } | Commands::ClearCache => unreachable!("handled before setup"),
    }

    let quota = orchestrator.quota();
    tracing::info!(
        calls = quota.total_calls,
        estimated_cost_usd = quota.estimated_cost_usd,
        elapsed = ?start_time.elapsed(),
        "Run complete"
    );
    if cli.verbose {
        eprintln!("{}", output::format_quota(&quota));
    }

    std::process::exit(EXIT_SUCCESS);
}

fn exit_on_setup_error(e: ConfigError) -> ! {
    eprintln!("Setup error: {}", e);
    match e {
        ConfigError::HttpClient(_) => std::process::exit(EXIT_NETWORK),
        _ => std::process::exit(EXIT_CONFIG),
    }
}

fn build_portal_transport(config: &Config) -> Result<Arc<dyn Transport>, ConfigError> {
    Ok(Arc::new(HttpTransport::new(config.inspections.request_timeout())?))
}

fn build_orchestrator(
    config: &Config,
    cache: ResultCache,
) -> Result<EnrichmentOrchestrator, ConfigError> {
    let places: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.places.request_timeout())?);
    let portals = build_portal_transport(config)?;
    let fusion = ScoreFusionEngine::today(&config.scoring);

    EnrichmentOrchestrator::from_config(config, places, portals, cache, fusion)
}

fn print_outcomes(outcomes: &[EnrichmentOutcome], json: bool, use_colors: bool) {
    if json {
        print_json(&outcomes);
        return;
    }
    let blocks: Vec<String> = outcomes
        .iter()
        .map(|o| output::format_outcome(o, use_colors))
        .collect();
    println!("{}", blocks.join("\n\n"));
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Failed to encode output: {}", e);
            std::process::exit(EXIT_INPUT);
        }
    }
}

/// Read "name<TAB>address<TAB>rating[<TAB>confidence]" lines. Blank lines and `#` comments are skipped.
fn read_batch(path: &Path) -> Result<Vec<(BusinessEntity, BasePrediction)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut entities = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim_end();
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < 3 {
            anyhow::bail!("line {}: expected name, address and rating separated by tabs", i + 1);
        }
        let rating: f64 = fields[2]
            .parse()
            .with_context(|| format!("line {}: invalid rating '{}'", i + 1, fields[2]))?;
        let confidence: f64 = match fields.get(3) {
            Some(value) => value
                .parse()
                .with_context(|| format!("line {}: invalid confidence '{}'", i + 1, value))?,
            None => 1.0,
        };
        entities.push((
            BusinessEntity::new(fields[0], fields[1]),
            BasePrediction::new(rating, confidence, DEFAULT_MODEL_VERSION),
        ));
    }
    Ok(entities)
}
