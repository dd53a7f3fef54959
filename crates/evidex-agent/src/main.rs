//! Evidex — evidence corpus builder.
//! Entry point for the batch binary: loads config and categories, builds the
//! shared fetcher and sources, runs every category, prints a summary.

mod config;

use anyhow::Context;
use clap::Parser;
use evidex_common::sandbox::SandboxClient;
use evidex_common::CategorySet;
use evidex_db::{CardRepository, CardStore, Database, MemoryCardStore};
use evidex_ingestion::{
    CorpusPipeline, EmbeddingClient, Fetcher, IngestionRepository, PipelineSettings, RunReport, SourceSet,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Exit status when the run finished but some items failed.
const EXIT_WITH_ERRORS: u8 = 2;
/// Exit status for startup failures (config, categories, database).
const EXIT_FATAL: u8 = 1;

#[derive(Debug, Parser)]
#[command(name = "evidex", version, about = "Build the evidence-card corpus from PubMed, OpenAlex and Europe PMC")]
struct Cli {
    /// Path to evidex.toml.
    #[arg(long, env = "EVIDEX_CONFIG", default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Category definitions; overrides `categories` in the config file.
    #[arg(long)]
    categories: Option<PathBuf>,

    /// Run a single category by id.
    #[arg(long, value_name = "CATEGORY_ID")]
    only: Option<String>,

    /// Print the selection only: no abstracts, embedding or persistence.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("evidex=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Evidex starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::from(exit_status(&report))
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunReport> {
    let config = config::Config::load(&cli.config)?;
    info!(path = %cli.config.display(), "Configuration loaded");

    let categories_path = cli
        .categories
        .clone()
        .unwrap_or_else(|| config.categories_path(&cli.config));
    let categories = CategorySet::load(&categories_path)
        .with_context(|| format!("loading categories from {}", categories_path.display()))?
        .restrict_to(cli.only.as_deref())?;
    info!(categories = categories.categories.len(), path = %categories_path.display(), "Categories loaded");

    // Outbound HTTP
    let mut client = SandboxClient::new()?;
    for url in [
        &config.sources.pubmed_base_url,
        &config.sources.openalex_base_url,
        &config.sources.europepmc_search_url,
    ] {
        client.allow_url_host(url)?;
    }
    let fetcher = Arc::new(Fetcher::http(&config.fetcher, client.clone()));
    let sources = SourceSet::live(fetcher.clone(), &config.sources);
    let embedder = Arc::new(EmbeddingClient::new(config.embedding.clone(), client)?);
    if !cli.dry_run {
        info!(endpoint = embedder.endpoint(), model = %config.embedding.model, dim = config.embedding.dim, "Embedding service");
    }

    // Storage
    let store: Arc<dyn CardStore> = if cli.dry_run {
        info!("Dry run: nothing will be embedded or written");
        Arc::new(MemoryCardStore::new())
    } else {
        info!("Connecting to Postgres...");
        let db = Database::connect(&config.database.url, config.embedding.dim)
            .await
            .context("connecting to Postgres")?;
        db.initialize().await.context("initialising schema")?;
        let db = Arc::new(db);
        let stats = db.stats().await?;
        info!(cards = stats.cards, categories = stats.categories, "✅ Postgres connected.");
        Arc::new(CardRepository::new(db))
    };

    let settings = PipelineSettings {
        max_results_per_query: config.sources.max_results_per_query,
        scoring: config.scoring.clone(),
        enrichment_concurrency: config.fetcher.max_concurrency,
        dry_run: cli.dry_run,
        ..Default::default()
    };
    let pipeline = CorpusPipeline::new(sources, embedder, IngestionRepository::new(store), settings);
    let report = pipeline.run(&categories).await;

    let stats = fetcher.stats();
    info!(network_calls = stats.network_calls, cache_hits = stats.cache_hits, "Fetcher totals");
    Ok(report)
}

fn exit_status(report: &RunReport) -> u8 {
    if report.has_errors() { EXIT_WITH_ERRORS } else { 0 }
}

fn print_summary(report: &RunReport) {
    println!();
    println!("Run {} ({} ms){}", report.job_id, report.duration_ms, if report.dry_run { " [dry run]" } else { "" });
    println!(
        "{:<24} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "category", "recalled", "scored", "selected", "imported", "skipped", "errors"
    );
    for c in &report.categories {
        println!(
            "{:<24} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            c.category_id, c.recalled, c.scored, c.selected, c.imported, c.skipped, c.errors.len()
        );
    }
    println!(
        "total: imported {}, skipped {}, errors {}",
        report.imported(),
        report.skipped(),
        report.error_count()
    );

    if report.dry_run {
        for c in &report.categories {
            println!();
            println!("{}:", c.category_id);
            for p in &c.selection {
                println!("  {:>6.3}  {:<12} {:<10} {:<20} {}", p.score, p.tier, p.pmid, p.subtopic, p.title);
            }
        }
    }
}
