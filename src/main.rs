use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use config::Config;
use github::GithubClient;
use hosting::HostingApi;
use output::{DateRange, QueryResult, Table};
use types::OverallRow;

mod accumulator;
mod aggregator;
mod config;
mod dedup;
mod error;
mod github;
mod hosting;
mod metrics;
mod output;
mod refresh;
mod reqwest_simd_json;
mod selector;
mod server;
mod types;
mod utils;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "repopulse")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use comma-separated number formatting
    #[arg(long, global = true)]
    number_comma: bool,

    /// Use human-readable number formatting (k, m, b, t)
    #[arg(short = 'H', long, global = true)]
    number_human: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate contributor metrics for a date range and write them to disk
    Run(RunArgs),
    /// Serve the persisted metrics over HTTP
    Serve(ServeArgs),
    /// Print a persisted metrics table
    Query(QueryArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args)]
struct RunArgs {
    /// First day of the window (YYYY-MM-DD, UTC)
    #[arg(long)]
    from: String,

    /// Last day of the window, included through 23:59:59 (YYYY-MM-DD, UTC)
    #[arg(long)]
    to: String,

    /// Repository as owner/name; overrides the configured one
    #[arg(long, env = "GITHUB_REPO")]
    repo: Option<String>,

    /// Directory the CSV tables are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Maximum number of branches processed at once
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Args)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct QueryArgs {
    /// Read the per-day table instead of the overall summary
    #[arg(long, default_value_t = false)]
    daily: bool,

    /// Keep daily rows on or after this date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,

    /// Keep daily rows on or before this date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<String>,

    /// Print rows as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Directory the CSV tables are read from
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (token, repo, api-url, timeout-seconds, max-concurrent-branches,
        /// output-dir, default-days, host, port, allowed-origin, number-comma, number-human,
        /// locale, decimal-places)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so `query --json` output stays machine-readable.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match Config::load_effective() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e:#}");
            std::process::exit(1);
        }
    };
    config.formatting.number_comma |= cli.number_comma;
    config.formatting.number_human |= cli.number_human;

    match cli.command {
        Commands::Run(args) => {
            if let Err(e) = run_aggregation(config, args).await {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Serve(args) => {
            if let Err(e) = run_server(config, args).await {
                eprintln!("Server error: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Query(args) => {
            if let Err(e) = run_query(&config, args) {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        Commands::Config(config_args) => {
            handle_config_subcommand(config_args);
        }
    }
}

fn github_api(config: &Config) -> Result<Arc<dyn HostingApi>> {
    config.require_credentials()?;
    let client = GithubClient::new(&config.github).context("Failed to build GitHub client")?;
    Ok(Arc::new(client))
}

async fn run_aggregation(mut config: Config, args: RunArgs) -> Result<()> {
    let window = utils::parse_date_window(&args.from, &args.to)?;
    if let Some(repo) = args.repo {
        config.github.repo = repo;
    }
    if let Some(dir) = args.output_dir {
        config.aggregation.output_dir = dir;
    }
    if let Some(concurrency) = args.concurrency {
        anyhow::ensure!(concurrency >= 1, "--concurrency must be at least 1");
        config.aggregation.max_concurrent_branches = concurrency;
    }

    let api = github_api(&config)?;
    let tables = refresh::refresh_metrics(
        api,
        &config.github.repo,
        window,
        config.aggregation.max_concurrent_branches,
        &config.aggregation.output_dir,
    )
    .await?;

    let mut overall = tables.overall;
    overall.sort_by(|a, b| {
        b.total_commits
            .cmp(&a.total_commits)
            .then_with(|| a.user.cmp(&b.user))
    });
    println!("{} from {} to {}", config.github.repo, args.from, args.to);
    print_overall(&overall, &config);
    println!("\nSaved to {}", config.aggregation.output_dir.display());
    Ok(())
}

async fn run_server(mut config: Config, args: ServeArgs) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let api = github_api(&config)?;
    server::serve(&config, api).await
}

fn run_query(config: &Config, args: QueryArgs) -> Result<()> {
    let range = DateRange {
        from: args.from.as_deref().map(utils::parse_date).transpose()?,
        to: args.to.as_deref().map(utils::parse_date).transpose()?,
    };
    let table = if args.daily {
        Table::Daily
    } else {
        Table::Overall
    };
    let dir = args
        .output_dir
        .unwrap_or_else(|| config.aggregation.output_dir.clone());

    let result = output::query(&dir, table, range)?;
    tracing::debug!(rows = result.len(), "query from {}", dir.display());

    if args.json {
        let json = simd_json::to_string_pretty(&result)?;
        println!("{json}");
        return Ok(());
    }

    match result {
        QueryResult::Overall(rows) => print_overall(&rows, config),
        QueryResult::Daily(rows) => {
            let options = config.number_format();
            let width = rows.iter().map(|r| r.user.len()).max().unwrap_or(4).max(4);
            println!("{:<width$}  {:<10}  {:>8}", "User", "Date", "Commits");
            for row in rows {
                println!(
                    "{:<width$}  {}  {:>8}",
                    row.user,
                    row.date.format("%Y-%m-%d"),
                    utils::format_number(row.commits, &options)
                );
            }
        }
    }
    Ok(())
}

fn print_overall(rows: &[OverallRow], config: &Config) {
    if rows.is_empty() {
        println!("No commits in range.");
        return;
    }

    let options = config.number_format();
    let width = rows.iter().map(|r| r.user.len()).max().unwrap_or(4).max(4);
    println!(
        "{:<width$}  {:>6}  {:>8}  {:>6}  {:>10}  {:>10}",
        "User", "Days", "Commits", "Files", "Added", "Removed"
    );
    for row in rows {
        println!(
            "{:<width$}  {:>6}  {:>8}  {:>6}  {:>10}  {:>10}",
            row.user,
            utils::format_number(row.total_coding_days, &options),
            utils::format_number(row.total_commits, &options),
            utils::format_number(row.files_changed, &options),
            utils::format_number(row.lines_added, &options),
            utils::format_number(row.lines_removed, &options),
        );
    }
}

fn handle_config_subcommand(config_args: ConfigArgs) {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => {
            if let Err(e) = config::create_default_config(overwrite) {
                eprintln!("Error creating config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Show => {
            if let Err(e) = config::show_config() {
                eprintln!("Error showing config: {e}");
                std::process::exit(1);
            }
        }
        ConfigSubcommands::Set { key, value } => {
            if let Err(e) = config::set_config_value(&key, &value) {
                eprintln!("Error setting config: {e}");
                std::process::exit(1);
            }
        }
    }
}
