use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use codescope_graph::{CodeGraph, Config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codescope")]
#[command(about = "Static source-code analysis engine for Python projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a project directory and persist the code graph
    Analyze {
        /// Path to the Python project to analyze
        project_path: PathBuf,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Disable the analysis cache for this run
        #[arg(long)]
        no_cache: bool,

        /// Process files one at a time instead of using the worker pool
        #[arg(long)]
        sequential: bool,

        /// Override the state file location
        #[arg(long)]
        state: Option<PathBuf>,
    },

    /// Print cache statistics
    Cache {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Wipe the cache instead of printing statistics
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .init();

    match cli.command {
        Commands::Analyze {
            project_path,
            config,
            no_cache,
            sequential,
            state,
        } => analyze(project_path, config, no_cache, sequential, state).await,
        Commands::Cache { config, clear } => cache(config, clear).await,
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            Config::load(&path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(Config::default()),
    }
}

async fn analyze(
    project_path: PathBuf,
    config_path: Option<PathBuf>,
    no_cache: bool,
    sequential: bool,
    state: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if no_cache {
        config.cache.enabled = false;
    }
    if sequential {
        config.analysis.parallel = false;
    }
    if let Some(state) = state {
        config.persistence.state_file = state;
    }

    let mut graph = CodeGraph::new(config, None)
        .await
        .context("initializing analysis engine")?;

    println!("Analyzing project: {}", project_path.display());
    let summary = graph
        .analyze_project(&project_path)
        .await
        .context("project analysis failed")?;

    println!("Files analyzed:  {}", summary.files_analyzed);
    println!("Files skipped:   {}", summary.files_skipped);
    println!("Files failed:    {}", summary.files_failed);
    println!("Nodes created:   {}", summary.nodes_created);
    println!("Edges created:   {}", summary.edges_created);
    println!("Duration:        {} ms", summary.duration_ms);
    println!("Total LOC:       {}", summary.aggregate.total_loc);
    println!(
        "Avg complexity:  {:.2}",
        summary.aggregate.average_complexity
    );
    println!(
        "Avg quality:     {:.3}",
        summary.aggregate.average_quality_score
    );
    println!(
        "Security issues: {}",
        summary.aggregate.security_issue_count
    );
    println!("Code smells:     {}", summary.aggregate.code_smell_count);

    let errors = graph.error_summary();
    if errors.total > 0 {
        println!(
            "Reports:         {} ({} files affected)",
            errors.total,
            errors.failed_files.len()
        );
    }

    let state_file = graph.config().persistence.state_file.clone();
    graph.save(&state_file).await.context("saving state")?;
    println!("State saved to {}", state_file.display());

    Ok(())
}

async fn cache(config_path: Option<PathBuf>, clear: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let graph = CodeGraph::new(config, None).await?;

    if clear {
        graph.clear_cache().await.context("clearing cache")?;
        println!("Cache cleared");
        return Ok(());
    }

    let info = graph.cache_info().await;
    println!("Enabled:     {}", info.enabled);
    println!("Directory:   {}", info.directory.display());
    println!("Entries:     {}", info.entries);
    println!("Total bytes: {}", info.total_bytes);
    println!("Size cap:    {} bytes", info.max_bytes);
    println!("Compression: {}", info.compression);
    Ok(())
}
