// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use repo_harvest::utils::logging::{
    format_error, format_info, format_success, format_warning, init_logger,
};
use repo_harvest::{
    CollectOptions, CollectionResult, Config, Credentials, JsonExporter, LlmClient, LlmProvider,
    RepositoryFileCollector,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "repo-harvest")]
#[command(author = "cipher")]
#[command(version)]
#[command(about = "Collect GitHub repository files and query LLM providers", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect the text files of a repository
    Crawl(CrawlArgs),

    /// Send a prompt to the detected LLM provider
    Ask {
        prompt: String,

        #[arg(long)]
        no_cache: bool,
    },

    /// Show which LLM provider the environment selects
    Provider,
}

#[derive(Args)]
struct CrawlArgs {
    /// GitHub URL, `git@` address or `.git` URL. Falls back to GITHUB_URL and friends.
    url: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, value_name = "BYTES")]
    max_file_size: Option<u64>,

    /// Key files relative to the requested subdirectory
    #[arg(long)]
    relative: bool,

    #[arg(short, long = "include", value_name = "GLOB")]
    include: Vec<String>,

    #[arg(short, long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    #[arg(short, long)]
    pretty: bool,

    /// Also write the collected files under `<output>/files`
    #[arg(long, requires = "output")]
    mirror: bool,

    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if !cli.color {
        colored::control::set_override(false);
    }

    let (config, fallback) = load_config(&cli.config)?;

    let llm_log_dir =
        matches!(cli.command, Commands::Ask { .. }).then_some(config.llm.log_dir.as_path());
    init_logger(cli.color, cli.verbose, llm_log_dir);

    info!("Repo Harvest");
    info!("Loading configuration from: {}", cli.config.display());
    if let Some(reason) = fallback {
        warn!("{}", reason);
    }

    match cli.command {
        Commands::Crawl(args) => {
            cmd_crawl(&config, args, cli.color, cli.verbose).await?;
        }
        Commands::Ask { prompt, no_cache } => {
            cmd_ask(&config, &prompt, no_cache).await?;
        }
        Commands::Provider => {
            cmd_provider()?;
        }
    }

    Ok(())
}

/// Returns the configuration and, when defaults were used, the reason why.
fn load_config(path: &Path) -> Result<(Config, Option<String>)> {
    if path.exists() {
        let config = Config::load(Some(path)).context("Failed to load configuration")?;
        return Ok((config, None));
    }

    let missing = format!(
        "Config file {} not found, using default configuration",
        path.display()
    );

    match Config::load(None) {
        Ok(config) => Ok((config, Some(missing))),
        Err(e) => Ok((
            Config::default_config(),
            Some(format!("{}; falling back to built-in defaults: {}", missing, e)),
        )),
    }
}

async fn cmd_crawl(config: &Config, args: CrawlArgs, colored: bool, verbose: bool) -> Result<()> {
    let url = args
        .url
        .or_else(Credentials::repository_url)
        .context("No repository URL given; pass one or set GITHUB_URL")?;

    let mut crawler = config.crawler.clone();
    if let Some(size) = args.max_file_size {
        crawler.max_file_size = size;
    }
    crawler.use_relative_paths |= args.relative;
    if !args.include.is_empty() {
        crawler.include_patterns = args.include;
    }
    if !args.exclude.is_empty() {
        crawler.exclude_patterns = args.exclude;
    }

    let token = args.token.or_else(Credentials::github_token);
    if token.is_none() {
        warn!("No GITHUB_TOKEN set; unauthenticated requests are heavily rate limited");
    }

    let mut options =
        CollectOptions::from_config(&crawler, token).context("Invalid crawl options")?;
    options.show_progress = !args.no_progress;
    options.colored = colored;

    info!("Crawling {}", url);
    let start_time = Instant::now();

    let collector = RepositoryFileCollector::new(options);
    let Some(result) = collector
        .collect(&url)
        .await
        .with_context(|| format!("Failed to crawl {}", url))?
    else {
        println!(
            "{}",
            format_warning(&format!("No branch or commit in {} could be resolved", url))
        );
        return Ok(());
    };

    print_summary(&result, verbose);
    info!("Crawl complete in {:.2}s", start_time.elapsed().as_secs_f64());

    if let Some(output) = args.output {
        let exporter = JsonExporter::new(&output).context("Failed to create exporter")?;
        let manifest = exporter
            .export(&url, &result, args.pretty)
            .context("Export failed")?;
        println!(
            "{}",
            format_success(&format!(
                "Exported {} files to {}",
                manifest.total_files,
                output.display()
            ))
        );

        if args.mirror {
            let written = exporter.mirror(&result).context("Mirroring files failed")?;
            println!("{}", format_info(&format!("Mirrored {} files to disk", written)));
        }
    }

    Ok(())
}

fn print_summary(result: &CollectionResult, verbose: bool) {
    let stats = &result.stats;

    if let Some(error) = &stats.error {
        println!("{}", format_error(&format!("Collection failed: {}", error)));
    }

    println!(
        "{}",
        format_success(&format!(
            "Collected {} files ({} bytes)",
            stats.downloaded_count,
            result.total_bytes()
        ))
    );

    if stats.skipped_count > 0 {
        println!(
            "{}",
            format_warning(&format!("Skipped {} oversized files", stats.skipped_count))
        );
        if verbose {
            for skipped in &stats.skipped_files {
                println!("    {} ({} bytes)", skipped.path, skipped.size);
            }
        }
    }

    if !stats.failed_files.is_empty() {
        println!(
            "{}",
            format_error(&format!("{} files could not be read", stats.failed_files.len()))
        );
        if verbose {
            for failed in &stats.failed_files {
                println!("    {}: {}", failed.path, failed.reason);
            }
        }
    }

    if verbose {
        for path in result.files.keys() {
            println!("  {}", path);
        }
    }
}

async fn cmd_ask(config: &Config, prompt: &str, no_cache: bool) -> Result<()> {
    let client = LlmClient::new(&config.llm);
    let use_cache = config.llm.use_cache && !no_cache;

    let response = client
        .call_with_cache(prompt, use_cache)
        .await
        .context("LLM call failed")?;

    println!("{}", response);
    Ok(())
}

fn cmd_provider() -> Result<()> {
    let provider = LlmProvider::from_env().context("No LLM provider detected")?;

    println!("{}", format_info(&format!("Provider: {}", provider.name())));
    println!("{}", format_info(&format!("Model: {}", provider.model())));
    Ok(())
}
