//! Cattle Harvest main entry point
//!
//! This is the command-line interface for the cattle farm contact harvester.

use anyhow::{bail, Context};
use cattle_harvest::config::{load_config_with_hash, Config};
use cattle_harvest::crawler::{build_http_client, build_renderer, PageFetcher, RateLimiter};
use cattle_harvest::discovery::{generate_queries, DiscoverySource, DuckDuckGoHtml};
use cattle_harvest::extract::PageExtractor;
use cattle_harvest::robots::RobotsGate;
use cattle_harvest::state::JobType;
use cattle_harvest::storage::{lock, open_storage, SharedStorage};
use cattle_harvest::worker::{JobStore, Orchestrator, Shutdown};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Cattle Harvest: a polite contact harvester for cattle farms
///
/// Runs the harvest worker by default. The other modes manage jobs or
/// report on the database and exit.
#[derive(Parser, Debug)]
#[command(name = "cattle-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite contact harvester for cattle farms", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Queue a job (full, search, associations, directories) and exit
    #[arg(
        long,
        value_name = "TYPE",
        requires = "country",
        conflicts_with_all = ["list_jobs", "stats", "export_summary", "dry_run"]
    )]
    create_job: Option<JobType>,

    /// Country code of the job to create
    #[arg(long, value_name = "XX")]
    country: Option<String>,

    /// Region to target (repeatable; defaults to the country's top regions)
    #[arg(long = "region", value_name = "REGION")]
    regions: Vec<String>,

    /// List recent jobs and exit
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "dry_run"])]
    list_jobs: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Generate markdown summary from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(job_type) = cli.create_job {
        let country = cli.country.as_deref().unwrap_or_default();
        handle_create_job(&config, job_type, country, cli.regions)?;
    } else if cli.list_jobs {
        handle_list_jobs(&config)?;
    } else if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config, config_hash)?;
    } else {
        handle_worker(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("cattle_harvest=info,warn"),
            1 => EnvFilter::new("cattle_harvest=debug,info"),
            2 => EnvFilter::new("cattle_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<SharedStorage> {
    let path = Path::new(&config.output.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

/// Handles --create-job: queues a job and prints its id
fn handle_create_job(
    config: &Config,
    job_type: JobType,
    country: &str,
    regions: Vec<String>,
) -> anyhow::Result<()> {
    let country = country.trim().to_uppercase();
    let Some(profile) = config.country(&country) else {
        bail!("Unknown country: {}", country);
    };

    let mut target_regions = Vec::with_capacity(regions.len());
    for region in &regions {
        match profile.canonical_region(region) {
            Some(canonical) => target_regions.push(canonical.to_string()),
            None => bail!("Unknown region for {}: {}", country, region),
        }
    }

    let planned = if target_regions.is_empty() {
        &profile.top_regions
    } else {
        &target_regions
    };
    let total_queries = if job_type.runs(DiscoverySource::Search) {
        generate_queries(profile, planned, config.search.breed_variants).len() as u64
    } else {
        0
    };

    let jobs = JobStore::new(open_database(config)?);
    let id = jobs.create(job_type, &country, target_regions, total_queries)?;
    println!("{}", id);
    Ok(())
}

/// Handles --list-jobs: prints recent jobs with their counters
fn handle_list_jobs(config: &Config) -> anyhow::Result<()> {
    let jobs = JobStore::new(open_database(config)?).list(50)?;
    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }

    println!(
        "{:>5}  {:<12} {:<4} {:<10} {:>11} {:>8} {:>9} {:>7}",
        "ID", "TYPE", "CC", "STATUS", "QUERIES", "URLS", "PROCESSED", "EMAILS"
    );
    for job in jobs {
        println!(
            "{:>5}  {:<12} {:<4} {:<10} {:>11} {:>8} {:>9} {:>7}",
            job.id,
            job.job_type.to_string(),
            job.country,
            job.status.to_string(),
            format!("{}/{}", job.query_index, job.total_queries),
            job.urls_discovered,
            job.urls_processed,
            job.emails_found
        );
        if let Some(error) = &job.error {
            println!("       error: {}", error);
        }
    }
    Ok(())
}

/// Handles the --dry-run mode: shows what the worker would harvest
fn handle_dry_run(config: &Config) {
    println!("=== Cattle Harvest Dry Run ===\n");

    println!("Worker Configuration:");
    println!("  Batch size: {}", config.worker.batch_size);
    println!(
        "  Max concurrent requests: {}",
        config.worker.max_concurrent_requests
    );
    println!(
        "  Discovery batch size: {} queries",
        config.worker.discovery_batch_size
    );
    println!("  Query TTL: {} days", config.search.query_ttl_days);
    println!(
        "  Default request interval: {}ms",
        config.rate_limits.default_interval_ms
    );

    println!("\nFetcher:");
    println!("  User agent: {}", config.fetcher.user_agent);
    println!(
        "  Proxy: {}",
        if config.fetcher.proxy_url.is_some() { "enabled" } else { "disabled" }
    );
    println!(
        "  Heavy renderer: {}",
        config.renderer.endpoint.as_deref().unwrap_or("disabled")
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    println!(
        "\nActive Countries ({}):",
        config.worker.active_countries.len()
    );
    let mut total = 0;
    for code in &config.worker.active_countries {
        let Some(profile) = config.country(code) else {
            continue;
        };
        let queries =
            generate_queries(profile, &profile.top_regions, config.search.breed_variants).len();
        total += queries;
        println!(
            "  - {} ({}): {} regions, {} top regions, {} queries",
            code,
            profile.name,
            profile.regions.len(),
            profile.top_regions.len(),
            queries
        );
        if !profile.directory_sites.is_empty() {
            println!("    * directories: {:?}", profile.directory_sites);
        }
    }

    println!("\nSkip domains: {}", config.skip_domains.len());
    println!("\n✓ Configuration is valid");
    println!("✓ A full cycle would plan {} search queries", total);
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use cattle_harvest::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.output.database_path);

    let storage = open_database(config)?;
    let stats = load_statistics(&*lock(&storage)?)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config, config_hash: String) -> anyhow::Result<()> {
    use cattle_harvest::output::{generate_markdown_summary, generate_summary};

    println!("=== Exporting Harvest Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    let storage = open_database(config)?;
    tracing::info!("Loading harvest data from database...");
    let summary = generate_summary(&*lock(&storage)?, Some(config_hash))?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the default mode: runs the worker until Ctrl-C
async fn handle_worker(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let storage = open_database(&config)?;

    let robots = Arc::new(RobotsGate::new(
        &config.fetcher.user_agent,
        Duration::from_millis(config.fetcher.robots_timeout_ms),
    )?);
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limits));
    let renderer = build_renderer(&config.renderer)?;
    let fetcher = Arc::new(PageFetcher::new(
        &config.fetcher,
        robots,
        limiter.clone(),
        renderer,
    )?);
    let backend = Arc::new(DuckDuckGoHtml::new(
        build_http_client(&config.fetcher)?,
        config.search.base_url.clone(),
        limiter,
    ));

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested, finishing in-flight work");
            signal.request();
        }
    });

    let orchestrator = Orchestrator::new(
        config.clone(),
        storage,
        fetcher.clone(),
        backend,
        Arc::new(PageExtractor::new()),
        shutdown,
    );

    let result = orchestrator.run().await;
    fetcher.shutdown().await;

    match result {
        Ok(()) => {
            tracing::info!("Worker exited cleanly");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Worker failed: {}", e);
            Err(e.into())
        }
    }
}
