//! Toolhub CLI - run registry operations against the demonstration tools

mod demo;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use toolhub_core::config::ToolHubConfig;
use toolhub_core::service::{
    BulkExecuteRequest, ExecuteRequest, ToolHubService, registry_from_config,
};
use toolhub_core::tools::ToolExecution;

#[derive(Parser)]
#[command(name = "toolhub")]
#[command(about = "Toolhub registry CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to toolhub.toml and TOOLHUB_* variables)
    #[arg(short, long, env = "TOOLHUB_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered tools
    List {
        /// Only tools whose credentials are configured
        #[arg(long)]
        available: bool,
    },
    /// Show available tools grouped by capability
    Capabilities,
    /// Show the configuration of one tool
    Config {
        /// Tool name
        name: String,
    },
    /// Execute one tool
    Exec {
        /// Tool name
        name: String,
        /// JSON parameters
        #[arg(short, long, default_value = "{}")]
        params: String,
        /// Calling agent
        #[arg(short, long, default_value = "cli")]
        agent: String,
        /// Skip the result cache
        #[arg(long)]
        no_cache: bool,
        /// Cached result TTL in seconds
        #[arg(long)]
        ttl_secs: Option<u64>,
        /// Repeat the call to observe cache hits
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },
    /// Execute a batch read from a JSON file (`-` for stdin)
    Bulk {
        /// File holding a JSON array of {tool_name, parameters} objects
        file: PathBuf,
        /// Calling agent
        #[arg(short, long, default_value = "cli")]
        agent: String,
        /// Run calls one at a time
        #[arg(long)]
        sequential: bool,
        /// Skip the result cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Print cache statistics
    Stats,
    /// Version information
    Version,
}

fn load_config(path: Option<&PathBuf>) -> Result<ToolHubConfig> {
    let config = match path {
        Some(path) => ToolHubConfig::from_file(path)?,
        None => ToolHubConfig::load()?,
    };
    Ok(config)
}

fn read_batch(file: &PathBuf) -> Result<Vec<ToolExecution>> {
    let raw = if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read batch from stdin")?
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read batch file {}", file.display()))?
    };
    serde_json::from_str(&raw).context("Batch must be a JSON array of tool executions")
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("toolhub {}", env!("CARGO_PKG_VERSION"));
        println!("toolhub-core {}", toolhub_core::VERSION);
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    tracing::debug!(config_path = ?cli.config, "Loaded configuration");
    let mut registry = registry_from_config(&config).await?;
    demo::register_all(&mut registry).await;
    tracing::debug!(tools = registry.len(), "Registered demonstration tools");
    let service = ToolHubService::new(Arc::new(registry));

    match cli.command {
        Commands::List { available } => {
            for metadata in service.registry().list_with_metadata(available) {
                println!("{:<12} {}", metadata.name, metadata.description);
            }
        }
        Commands::Capabilities => print_json(&service.list_available())?,
        Commands::Config { name } => match service.get_tool_config(&name) {
            Some(view) => print_json(&view)?,
            None => anyhow::bail!("Tool '{}' not found", name),
        },
        Commands::Exec {
            name,
            params,
            agent,
            no_cache,
            ttl_secs,
            repeat,
        } => {
            let parameters: Value =
                serde_json::from_str(&params).context("--params must be valid JSON")?;
            for _ in 0..repeat.max(1) {
                let mut request = ExecuteRequest::new(&name, parameters.clone()).with_agent(&agent);
                request.use_cache = !no_cache;
                request.cache_ttl = ttl_secs.map(Duration::from_secs);
                print_json(&service.execute(request).await)?;
            }
        }
        Commands::Bulk {
            file,
            agent,
            sequential,
            no_cache,
        } => {
            let request = BulkExecuteRequest {
                requests: read_batch(&file)?,
                agent_id: agent,
                use_cache: !no_cache,
                parallel: !sequential,
            };
            print_json(&service.bulk_execute(request).await)?;
        }
        Commands::Stats => print_json(&service.cache_stats().await)?,
        Commands::Version => {}
    }

    Ok(())
}
