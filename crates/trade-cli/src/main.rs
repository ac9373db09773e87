use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trade_client::{ComtradeClient, ComtradeConfig};
use trade_core::export;
use trade_core::models::{TradeFilter, TradeFlow, YearRange};
use trade_core::normalize::Normalizer;
use trade_core::pipeline::{ExtractionPlan, ExtractionService, RunReport, SampleSettings};
use trade_db::{Database, DatabaseConfig, TradeRepository};

#[derive(Parser)]
#[command(name = "trade", version, about = "UN Comtrade trade statistics pipeline")]
struct Cli {
    /// SQLite database file (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Seed for generated sample data
    #[arg(long, global = true, env = "SAMPLE_SEED")]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the default extraction (falls back to sample data)
    Extract,

    /// Refresh the last two years for the main reporters
    UpdateRecent,

    /// Extract one reporter and year
    ExtractSpecific {
        /// Reporter country code (e.g., "USA")
        #[arg(short, long)]
        reporter: String,

        /// Partner country code; all partners when omitted
        #[arg(short, long)]
        partner: Option<String>,

        #[arg(short, long)]
        year: i32,

        /// HS code; TOTAL when omitted
        #[arg(long)]
        hs_code: Option<String>,
    },

    /// Generate and store sample records without calling the API
    Sample {
        /// Number of records to generate
        #[arg(short, long, default_value_t = 500)]
        count: usize,
    },

    /// Print stored records
    Query {
        #[command(flatten)]
        filter: FilterArgs,

        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<u32>,

        /// Print CSV instead of JSON
        #[arg(long, default_value_t = false)]
        csv: bool,

        /// Write CSV to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show aggregate statistics
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Rank reporters by total trade value
    TopTraders {
        /// Trade flow (Import, Export, Re-Import, Re-Export or M/X/RM/RX)
        #[arg(short, long)]
        flow: Option<TradeFlow>,

        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// Show total trade value per year and flow
    Trends {
        /// Reporter country code; all reporters when omitted
        #[arg(short, long)]
        country: Option<String>,
    },

    /// Delete records stored more than N days ago
    Cleanup {
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    year: Option<i32>,

    /// Reporter country code
    #[arg(long)]
    reporter: Option<String>,

    /// Partner country code
    #[arg(long)]
    partner: Option<String>,

    #[arg(long)]
    flow: Option<TradeFlow>,

    /// HS code prefix (e.g., "84" also matches "8471")
    #[arg(long)]
    hs_code: Option<String>,
}

impl From<FilterArgs> for TradeFilter {
    fn from(args: FilterArgs) -> Self {
        TradeFilter {
            year: args.year,
            reporter_code: args.reporter.map(|c| c.trim().to_uppercase()),
            partner_code: args.partner.map(|c| c.trim().to_uppercase()),
            trade_flow: args.flow,
            hs_code: args.hs_code.map(|c| c.trim().to_uppercase()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout carries only data
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trade=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut db_config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    if let Some(path) = cli.database {
        db_config.url = path;
    }
    let repo = connect_db(&db_config).await?;

    let samples = SampleSettings {
        seed: cli.seed,
        policy: db_config.duplicate_policy,
        ..Default::default()
    };

    match cli.command {
        Commands::Extract => {
            cmd_extract(repo, samples, ExtractionPlan::full_default()).await?;
        }
        Commands::UpdateRecent => {
            let year = chrono::Utc::now().year();
            cmd_extract(repo, samples, ExtractionPlan::recent(year)).await?;
        }
        Commands::ExtractSpecific {
            reporter,
            partner,
            year,
            hs_code,
        } => {
            let plan = ExtractionPlan::specific(
                reporter.trim().to_uppercase(),
                partner.map(|p| p.trim().to_uppercase()),
                year,
                hs_code,
            );
            cmd_extract(repo, samples, plan).await?;
        }
        Commands::Sample { count } => {
            cmd_sample(repo, SampleSettings { count, ..samples }).await?;
        }
        Commands::Query {
            filter,
            limit,
            csv,
            output,
        } => {
            cmd_query(&repo, filter.into(), limit, csv, output).await?;
        }
        Commands::Summary { filter } => {
            cmd_summary(&repo, filter.into()).await?;
        }
        Commands::TopTraders { flow, limit } => {
            cmd_top_traders(&repo, flow, limit).await?;
        }
        Commands::Trends { country } => {
            let country = country.map(|c| c.trim().to_uppercase());
            cmd_trends(&repo, country.as_deref()).await?;
        }
        Commands::Cleanup { days } => {
            let deleted = repo
                .cleanup_old_data(days)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("Deleted {deleted} records older than {days} days");
        }
    }

    Ok(())
}

/// Open the SQLite database and make sure the schema exists.
async fn connect_db(config: &DatabaseConfig) -> Result<TradeRepository> {
    let db = Database::connect(config)
        .await
        .with_context(|| format!("Failed to open database at {}", config.url))?;
    db.initialize().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db.trade_repo())
}

fn extraction_service(
    repo: TradeRepository,
    samples: SampleSettings,
) -> Result<ExtractionService<ComtradeClient, TradeRepository>> {
    let config = ComtradeConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(tier = ?config.tier(), "Using Comtrade API");
    let client = ComtradeClient::new(config).context("Failed to create HTTP client")?;
    Ok(ExtractionService::new(
        client,
        repo,
        Normalizer::new(YearRange::up_to_current()),
        samples,
    ))
}

async fn cmd_extract(
    repo: TradeRepository,
    samples: SampleSettings,
    plan: ExtractionPlan,
) -> Result<()> {
    let service = extraction_service(repo, samples)?;

    // Ctrl-C stops the run between shards
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current shard");
            token.cancel();
        }
    });

    let report = service
        .run(&plan, &cancel)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    print_report(&report);
    Ok(())
}

async fn cmd_sample(repo: TradeRepository, samples: SampleSettings) -> Result<()> {
    let service = extraction_service(repo, samples)?;
    let report = service
        .generate_sample()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Run {}", report.run_id);
    println!("  live records:   {}", report.live_records);
    println!("  sample records: {}", report.sample_records);
    if let Some(seed) = report.sample_seed {
        println!("  sample seed:    {seed}");
    }
    println!("  dropped rows:   {}", report.dropped);
    println!("  failed shards:  {}", report.failed_shards);
    if report.cancelled {
        println!("  cancelled before completion");
    }
}

async fn cmd_query(
    repo: &TradeRepository,
    filter: TradeFilter,
    limit: Option<u32>,
    csv: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let records = repo
        .query_limited(&filter, limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if let Some(path) = output {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        export::write_csv(&records, BufWriter::new(file)).map_err(|e| anyhow::anyhow!(e))?;
        tracing::info!(records = records.len(), path = %path.display(), "Exported CSV");
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if csv {
        export::write_csv(&records, &mut out).map_err(|e| anyhow::anyhow!(e))?;
    } else {
        serde_json::to_writer_pretty(&mut out, &records)?;
        writeln!(out)?;
    }
    Ok(())
}

async fn cmd_summary(repo: &TradeRepository, filter: TradeFilter) -> Result<()> {
    let stats = repo
        .summary_stats(&filter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("Records:          {}", stats.record_count);
    println!("Total value:      ${:.2}", stats.total_trade_value);
    println!("Countries:        {}", stats.distinct_country_count);
    println!("Reporters:        {}", stats.unique_reporters);
    println!("Partners:         {}", stats.unique_partners);
    println!("HS codes:         {}", stats.distinct_hs_count);
    println!("Years:            {}", stats.year_range());
    Ok(())
}

async fn cmd_top_traders(
    repo: &TradeRepository,
    flow: Option<TradeFlow>,
    limit: u32,
) -> Result<()> {
    let traders = repo
        .top_traders(flow, limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if traders.is_empty() {
        println!("No trade data stored");
        return Ok(());
    }
    for (i, t) in traders.iter().enumerate() {
        println!(
            "{:>3}. {} {:<30} ${:>20.2} ({} records)",
            i + 1,
            t.reporter_code,
            t.reporter_name,
            t.total_value,
            t.record_count
        );
    }
    Ok(())
}

async fn cmd_trends(repo: &TradeRepository, country: Option<&str>) -> Result<()> {
    let trends = repo
        .trade_trends(country)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if trends.is_empty() {
        println!("No trade data stored");
        return Ok(());
    }
    for point in &trends {
        println!(
            "{} {:<10} ${:>20.2}",
            point.year,
            point.trade_flow.as_str(),
            point.total_value
        );
    }
    Ok(())
}
