use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use nova_core::clients::{AdsArchive, CsvGalaxyCatalog, SimbadTapResolver};
use nova_core::clients::{ads, simbad};
use nova_core::config::PipelineConfig;
use nova_core::db;
use nova_core::pipeline::{Pipeline, RunOutcome};
use nova_core::store::{MemoryStore, MetadataStore, PgStore};
use nova_core::types::CandidateRequest;

#[derive(Parser, Debug)]
#[command(author, version, about = "Nova candidate resolution pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a candidate and stage its metadata and harvest backlog
    Ingest(IngestArgs),
    /// Look up the audit record for a past run
    RunStatus(RunStatusArgs),
    /// List harvest backlog entries for a candidate
    Queue(QueueArgs),
    /// Run database migrations
    Migrate,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Candidate name, e.g. "V1324 Sco"
    candidate_name: String,
    /// Run against an in-memory store instead of Postgres
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct RunStatusArgs {
    run_id: Uuid,
}

#[derive(Args, Debug)]
struct QueueArgs {
    candidate_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Ingest(args) => ingest(args).await,
        Command::RunStatus(args) => run_status(args).await,
        Command::Queue(args) => queue(args).await,
        Command::Migrate => {
            let pool = connect_pool().await?;
            db::run_migrations(&pool).await?;
            info!("Database migrations applied");
            Ok(())
        }
    }
}

async fn ingest(args: IngestArgs) -> Result<()> {
    let config = PipelineConfig::from_env();

    let simbad_url =
        std::env::var("SIMBAD_TAP_URL").unwrap_or_else(|_| simbad::DEFAULT_TAP_URL.to_string());
    let resolver = SimbadTapResolver::new(simbad_url, config.call_timeout)?;

    let catalog_path = std::env::var("GALAXY_CATALOG_PATH")
        .unwrap_or_else(|_| "reference/nearby_galaxies.csv".to_string());
    let catalog = CsvGalaxyCatalog::from_path(&catalog_path)?;

    let ads_url =
        std::env::var("ADS_API_URL").unwrap_or_else(|_| ads::DEFAULT_API_URL.to_string());
    let ads_token = std::env::var("ADS_TOKEN").context("ADS_TOKEN must be set")?;
    let archive = AdsArchive::new(ads_url, ads_token, config.call_timeout)?;

    let store: Arc<dyn MetadataStore> = if args.dry_run {
        Arc::new(MemoryStore::new())
    } else {
        let pool = connect_pool().await?;
        db::run_migrations(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let pipeline = Pipeline::new(
        Arc::new(resolver),
        Arc::new(catalog),
        Arc::new(archive),
        store,
        config,
    );

    let report = pipeline.run(CandidateRequest::new(&args.candidate_name)).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    match report.outcome {
        RunOutcome::Succeeded(_) => Ok(()),
        RunOutcome::Failed {
            stage,
            kind,
            attempts,
            ..
        } => bail!(
            "run {} failed at {stage} ({kind}) after {attempts} attempt(s)",
            report.run_id
        ),
    }
}

async fn run_status(args: RunStatusArgs) -> Result<()> {
    let pool = connect_pool().await?;
    let store = PgStore::new(pool);
    match store.fetch_run(args.run_id).await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => bail!("no run found with id {}", args.run_id),
    }
}

async fn queue(args: QueueArgs) -> Result<()> {
    let pool = connect_pool().await?;
    let store = PgStore::new(pool);
    let entries = store.queue_entries_for(&args.candidate_name).await?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

async fn connect_pool() -> Result<db::DbPool> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("NOVA_DATABASE_URL"))
        .context("DATABASE_URL (or NOVA_DATABASE_URL) must be set")?;
    db::connect(&database_url).await
}
