//! `ghg` — load emission factors and calculate activity emissions.
//!
//! # Usage
//!
//! ```
//! ghg load factors.json --replace
//! ghg calculate events/*.jsonl --output enriched.jsonl
//! ghg factors get --category mobile-combustion --activity "Diesel Fuel - Diesel Fuel"
//! ghg factors status
//! ```
//!
//! Settings come from `ghg.toml` (or `--config`), overridden by `GHG_*`
//! environment variables.

use std::{
  fs::File,
  io::BufWriter,
  path::{Path, PathBuf},
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand};
use ghg_calculator::{CalculatorConfig, Driver, input, output};
use ghg_core::{
  factor::FactorKey,
  loader::{self, LoadMode},
  store::{EmissionStore as _, FactorStore as _},
};
use ghg_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ghg", version, about = "GHG emission factor loader and calculator")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "ghg.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Validate the reference dataset and write it to the factor store.
  Load {
    /// JSON array of emission factor records.
    path:    PathBuf,
    /// Delete stored factors that the dataset no longer contains.
    #[arg(long)]
    replace: bool,
  },

  /// Calculate emissions for JSON-lines activity events.
  Calculate {
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Also write each event with its `emissions_output` to this file.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Inspect the factor store.
  Factors {
    #[command(subcommand)]
    command: FactorsCommand,
  },
}

#[derive(Subcommand)]
enum FactorsCommand {
  /// Print one factor as JSON.
  Get {
    #[arg(long)]
    category: String,
    #[arg(long)]
    activity: String,
  },
  /// Print the factor count and the most recent load.
  Status,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = CalculatorConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  match cli.command {
    Command::Load { path, replace } => load(&store, &path, replace).await,
    Command::Calculate { inputs, output } => calculate(store, &cfg, &inputs, output.as_deref()).await,
    Command::Factors { command: FactorsCommand::Get { category, activity } } => {
      let key = FactorKey::new(category, activity);
      let Some(record) = store.get_factor(&key).await.context("factor lookup failed")? else {
        bail!("no emission factor for {key}");
      };
      println!("{}", serde_json::to_string_pretty(&record)?);
      Ok(())
    }
    Command::Factors { command: FactorsCommand::Status } => status(&store).await,
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn load(store: &SqliteStore, path: &Path, replace: bool) -> anyhow::Result<()> {
  let json = std::fs::read_to_string(path)
    .with_context(|| format!("reading reference dataset {}", path.display()))?;
  let mode = if replace { LoadMode::Replace } else { LoadMode::Upsert };

  let loaded = match loader::parse_dataset(&json) {
    Ok(raw) => loader::load(store, raw, mode).await,
    Err(e) => Err(e),
  };
  let report = match loaded {
    Ok(report) => report,
    Err(e) => bail!("load of {} failed [{}]: {e}", path.display(), e.kind()),
  };

  println!(
    "loaded {} factors in {} batches ({} pruned), version {}",
    report.manifest.record_count,
    report.manifest.batch_count,
    report.pruned,
    report.manifest.dataset_version,
  );
  Ok(())
}

async fn calculate(
  store: SqliteStore,
  cfg: &CalculatorConfig,
  inputs: &[PathBuf],
  output_path: Option<&Path>,
) -> anyhow::Result<()> {
  let mut batch = input::EventBatch::default();
  for path in inputs {
    let events = input::read_events_file(path)
      .with_context(|| format!("reading events from {}", path.display()))?;
    batch.extend(events);
  }

  let summary = Driver::from_config(store, cfg).run(batch).await;

  if let Some(path) = output_path {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    output::write_enriched(BufWriter::new(file), &summary.emitted)
      .with_context(|| format!("writing enriched events to {}", path.display()))?;
  }

  println!(
    "run {}: {} processed, {} emitted, {} rejected",
    summary.run_id,
    summary.processed,
    summary.emitted.len(),
    summary.rejected.len(),
  );
  for rejection in &summary.rejected {
    println!("  {} [{}] {}", rejection.activity_event_id, rejection.kind, rejection.message);
  }
  Ok(())
}

async fn status(store: &SqliteStore) -> anyhow::Result<()> {
  let factors = store.count_factors().await?;
  let emissions = store.count_emissions().await?;
  println!("{factors} emission factors, {emissions} calculated emissions");

  match store.latest_load().await? {
    Some(m) => println!(
      "last load {} at {} ({} mode, {} records, version {})",
      m.load_id,
      m.loaded_at.to_rfc3339(),
      m.mode.as_str(),
      m.record_count,
      m.dataset_version,
    ),
    None => println!("no loads recorded"),
  }
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
