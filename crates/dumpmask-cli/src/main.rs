use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use dumpmask_core::{
    DEFAULT_HASH_COST, DEFAULT_MAX_LINE_BYTES, MAX_HASH_COST, MIN_HASH_COST, MaskRulesFile,
    MaskSettings, ProcessingMode,
};
use dumpmask_sql::{MaskingRules, StreamDriver};
use tracing_subscriber::EnvFilter;

/// Masks sensitive columns in a SQL dump read from stdin and writes the
/// result to stdout.
#[derive(Parser, Debug)]
#[command(name = "dumpmask", version, about = "Mask INSERT statements in SQL dumps")]
struct Cli {
    /// YAML file mapping table -> column -> template.
    #[arg(short = 'c', long, env = "DUMPMASK_CONFIG")]
    config: PathBuf,

    /// bcrypt cost used by `.Hashed`.
    #[arg(
        long,
        env = "DUMPMASK_COST",
        default_value_t = DEFAULT_HASH_COST,
        value_parser = clap::value_parser!(u32).range((MIN_HASH_COST as i64)..=(MAX_HASH_COST as i64))
    )]
    cost: u32,

    /// Line scheduling: sequential, ordered or unordered.
    #[arg(long, env = "DUMPMASK_MODE", default_value_t = ProcessingMode::Unordered)]
    mode: ProcessingMode,

    /// Lines masked concurrently (defaults to the number of CPUs).
    #[arg(long)]
    workers: Option<usize>,

    /// Longest accepted input line in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_BYTES)]
    max_line_bytes: usize,
}

impl Cli {
    fn settings(&self) -> Result<MaskSettings> {
        let mut settings = MaskSettings::default()
            .with_cost(self.cost)
            .with_mode(self.mode)
            .with_max_line_bytes(self.max_line_bytes);
        if let Some(workers) = self.workers {
            settings = settings.with_workers(workers);
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

fn load_rules(path: &Path, settings: &MaskSettings) -> Result<MaskingRules> {
    let file = MaskRulesFile::from_file(path)
        .with_context(|| format!("Failed to load rules from {}", path.display()))?;
    MaskingRules::compile(&file, settings)
        .with_context(|| format!("Failed to compile rules from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the masked dump, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let started = Instant::now();

    let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
    tracing::info!(cpus, "Starting dumpmask {}", env!("CARGO_PKG_VERSION"));

    let settings = cli.settings()?;
    let rules = load_rules(&cli.config, &settings)?;
    let driver = StreamDriver::new(Arc::new(rules), settings)?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let stats = driver
        .run(stdin, tokio::io::stdout())
        .await
        .context("Masking failed")?;

    tracing::info!(
        lines_read = stats.lines_read(),
        lines_written = stats.lines_written,
        lines_masked = stats.lines_masked,
        lines_dropped = stats.lines_dropped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Done"
    );

    Ok(())
}
