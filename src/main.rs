//! Level generator CLI
//!
//! Generates a tile level with wave function collapse and prints it as text
//! or JSON.
//!
//! Usage:
//!   cargo run --bin tile-level -- --width 12 --height 8 --seed 42
//!
//! Examples:
//!   # Built-in maze tileset, random seed, retry up to 5 times
//!   cargo run --bin tile-level -- --retries 5
//!
//!   # Custom catalog and config, JSON snapshot written to a file
//!   cargo run --bin tile-level -- \
//!     --catalog tiles.json \
//!     --config level.json \
//!     --format json \
//!     --output level_seed42.json

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use level_core::rng::resolve_seed;
use level_core::{
    generate, load_catalog, load_config, GenerationError, GeneratorConfig, LevelSnapshot,
    MismatchPolicy, ModuleCatalog, ResolvedLevel, TieBreak,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// One glyph per cell, one line per row
    Text,
    /// `LevelSnapshot` as pretty JSON
    Json,
}

/// Tile level generator
#[derive(Parser, Debug)]
#[command(name = "tile-level")]
#[command(about = "Generate tile levels with wave function collapse")]
struct Args {
    /// Grid width (overrides the config file)
    #[arg(long, short = 'W')]
    width: Option<i32>,

    /// Grid height (overrides the config file)
    #[arg(long, short = 'H')]
    height: Option<i32>,

    /// RNG seed, -1 for a time-derived one (overrides the config file)
    #[arg(long, short = 's', allow_negative_numbers = true)]
    seed: Option<i32>,

    /// Module catalog JSON file; the built-in maze tileset if omitted
    #[arg(long, short = 'c')]
    catalog: Option<PathBuf>,

    /// Generator config JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Extra attempts after a contradiction, each with the next seed
    #[arg(long, short = 'r', default_value_t = 0)]
    retries: u32,

    /// Break heap ties by cell index instead of at random
    #[arg(long)]
    stable_ties: bool,

    /// Record neighbor mismatches instead of failing on them
    #[arg(long)]
    record_mismatches: bool,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the level to this file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let catalog = match &args.catalog {
        Some(path) => load_catalog(path)
            .with_context(|| format!("failed to load catalog {}", path.display()))?,
        None => ModuleCatalog::maze(),
    };
    let config = build_config(&args)?;

    let level = generate_with_retries(config, &catalog, args.retries)?;
    for anomaly in &level.anomalies {
        warn!("Recorded anomaly: {}", anomaly);
    }

    let rendered = match args.format {
        OutputFormat::Text => render_text(&level, &catalog),
        OutputFormat::Json => LevelSnapshot::from_level(&level, &catalog)
            .to_json()
            .context("failed to serialize level")?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Level written to {}", path.display());
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<GeneratorConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GeneratorConfig::default(),
    };

    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.stable_ties {
        config.tie_break = TieBreak::StableIndex;
    }
    if args.record_mismatches {
        config.mismatch_policy = MismatchPolicy::Record;
    }

    Ok(config)
}

/// Run the generator, moving to the next seed after a failed attempt.
///
/// Only contradictions and neighbor mismatches are retried; bad input and
/// inconsistent results are reported immediately.
fn generate_with_retries(
    config: GeneratorConfig,
    catalog: &ModuleCatalog,
    retries: u32,
) -> Result<ResolvedLevel> {
    let base_seed = resolve_seed(config.seed);

    for attempt in 0..=retries {
        let seed = base_seed.wrapping_add(attempt as i32);
        let attempt_config = GeneratorConfig {
            seed,
            ..config.clone()
        };

        match generate(attempt_config, catalog) {
            Ok(level) => return Ok(level),
            Err(e @ (GenerationError::Contradiction(_) | GenerationError::NeighborMismatch(_))) => {
                warn!("Attempt {} (seed: {}) failed: {}", attempt + 1, seed, e);
            }
            Err(e) => return Err(e).context("level generation failed"),
        }
    }

    bail!(
        "no level found after {} attempts starting at seed {}",
        retries + 1,
        base_seed
    )
}

fn render_text(level: &ResolvedLevel, catalog: &ModuleCatalog) -> String {
    format!(
        "# {}x{} seed {} start {:?} goal {:?}\n{}",
        level.width,
        level.height,
        level.seed,
        level.start,
        level.goal,
        level.render_glyphs(catalog)
    )
}
