use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use query_core::{DynamicQuery, Filter, Page};
use repokit::{
    CancellationToken, MemoryStore, QueryOptions, RelationRegistry, Repository, Store,
};
use runtime::{AppConfig, CliArgs};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod json;

use json::JsonRecord;

/// repokit - dynamic filter, sort and paging over JSON data
#[derive(Parser)]
#[command(name = "repokit")]
#[command(about = "repokit - dynamic filter, sort and paging over JSON data")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Upper bound for page sizes (overrides config)
    #[arg(long)]
    max_page_size: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a dynamic query over a JSON array and print one page
    Query {
        /// JSON file holding an array of objects
        #[arg(short, long)]
        data: PathBuf,
        /// JSON file with `{ "filter": ..., "sort": [...] }`
        #[arg(short, long)]
        query: Option<PathBuf>,
        /// Server-side filter conjoined ahead of the query's filter (inline JSON)
        #[arg(long)]
        predicate: Option<String>,
        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        index: u32,
        /// Page size (defaults to repository.default_page_size)
        #[arg(long)]
        size: Option<u32>,
        /// Include rows with a `deletedAt` timestamp
        #[arg(long)]
        with_deleted: bool,
        /// Print the compiled filter and ordering instead of results
        #[arg(long)]
        explain: bool,
    },
    /// Check configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        print_config: cli.print_config,
        verbose: cli.verbose,
        max_page_size: cli.max_page_size,
    };

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::init_logging_from_config(&logging_config, Path::new(&config.home_dir));
    tracing::debug!(home_dir = %config.home_dir, "repokit starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Query {
            data,
            query,
            predicate,
            index,
            size,
            with_deleted,
            explain,
        } => {
            let request = QueryRequest {
                data,
                query,
                predicate,
                index,
                size,
                with_deleted,
            };
            if explain {
                explain_query(&config, &request)
            } else {
                let page = run_query(&config, &request).await?;
                println!("{}", serde_json::to_string_pretty(&page)?);
                Ok(())
            }
        }
        Commands::Check => check_config(&config),
    }
}

struct QueryRequest {
    data: PathBuf,
    query: Option<PathBuf>,
    predicate: Option<String>,
    index: u32,
    size: Option<u32>,
    with_deleted: bool,
}

impl QueryRequest {
    fn dynamic(&self) -> Result<DynamicQuery> {
        match &self.query {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read query file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid query JSON in {}", path.display()))
            }
            None => Ok(DynamicQuery::default()),
        }
    }

    fn predicate(&self) -> Result<Option<Filter>> {
        self.predicate
            .as_deref()
            .map(|raw| serde_json::from_str(raw).context("Invalid --predicate JSON"))
            .transpose()
    }

    fn dataset(&self) -> Result<json::Dataset> {
        let raw = std::fs::read_to_string(&self.data)
            .with_context(|| format!("Failed to read data file {}", self.data.display()))?;
        json::load(&raw)
    }
}

async fn run_query(config: &AppConfig, request: &QueryRequest) -> Result<Page<serde_json::Value>> {
    let dataset = request.dataset()?;
    let dynamic = request.dynamic()?;
    let predicate = request.predicate()?;

    let store = Arc::new(MemoryStore::new());
    let mut seed = repokit::ChangeSet::new();
    for record in dataset.records {
        seed.insert(record);
    }
    store.commit(seed).await.context("Failed to load data")?;

    let repo: Repository<JsonRecord, MemoryStore> = Repository::new(
        store,
        dataset.fields,
        Arc::new(RelationRegistry::new()),
        config.repository,
    );

    let options = QueryOptions {
        with_deleted: request.with_deleted,
        tracking: false,
        ..QueryOptions::default()
    };
    let page = config.repository.page(request.index, request.size)?;
    let result = repo
        .get_list_by_dynamic(&dynamic, predicate.as_ref(), &options, page, &CancellationToken::new())
        .await?;

    tracing::info!(
        total = result.total_count(),
        returned = result.items.len(),
        "query finished"
    );
    Ok(result.map_items(JsonRecord::into_json))
}

fn explain_query(config: &AppConfig, request: &QueryRequest) -> Result<()> {
    let dataset = request.dataset()?;
    let compiled = request
        .dynamic()?
        .compile(&dataset.fields, &config.repository.limits)?;
    let filter = match request.predicate()? {
        Some(root) => query_core::compile_filter(&root, &dataset.fields, &config.repository.limits)?
            .and(compiled.filter),
        None => compiled.filter,
    };

    println!("filter: {filter}");
    println!("params: {}", serde_json::to_string(&filter.params)?);
    println!("order:  {}", compiled.order);
    Ok(())
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    println!("Configuration check passed");
    println!("{}", config.to_yaml()?);
    Ok(())
}
