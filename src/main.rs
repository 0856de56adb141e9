mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use std::collections::HashMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shelfsense::Config;

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "Bookshop knowledge base with embedding-based retrieval", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, global = true, help = "Verbose logging")]
    verbose: bool,

    #[arg(long, global = true, help = "Knowledge base file (overrides SHELF_STORE_PATH)")]
    store: Option<PathBuf>,

    #[arg(long, global = true, help = "Embedding provider: openai or local (overrides SHELF_PROVIDER)")]
    provider: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed JSON Lines records and save them as the knowledge base
    Build {
        input: PathBuf,
        #[arg(long, help = "Embed items concurrently")]
        parallel: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Print the context string for a question
    Context {
        query: String,
        #[arg(short = 'k', long, help = "Number of items")]
        top_k: Option<usize>,
    },
    /// Ranked semantic search
    #[command(alias = "s")]
    Search {
        query: String,
        #[arg(short = 'k', long, help = "Number of items")]
        top_k: Option<usize>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show knowledge base statistics
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Write the knowledge base to a portable snapshot file
    Export { output: PathBuf },
    /// Replace the knowledge base with a snapshot file
    Import { input: PathBuf },

    // ===== MCP Server =====
    /// Start MCP server
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    shelfsense::logging::init(cli.verbose);

    let config = load_config(cli.store, cli.provider)?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Build {
            input,
            parallel,
            json,
        } => commands::build::run(&config, &input, parallel, json),
        Commands::Context { query, top_k } => commands::context::run(&config, &query, top_k),
        Commands::Search { query, top_k, json } => {
            commands::search::run(&config, &query, top_k, json)
        }
        Commands::Status { json } => commands::status::run(&config, json),
        Commands::Export { output } => commands::snapshot::export(&config, &output),
        Commands::Import { input } => commands::snapshot::import(&config, &input),

        // MCP Server
        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(&config);
                Ok(())
            } else {
                run_mcp_server(config)
            }
        }
    }
}

/// Environment first, command-line flags on top.
fn load_config(store: Option<PathBuf>, provider: Option<String>) -> anyhow::Result<Config> {
    let mut overrides = HashMap::new();
    if let Some(store) = store {
        overrides.insert("SHELF_STORE_PATH".to_string(), store.display().to_string());
    }
    if let Some(provider) = provider {
        overrides.insert("SHELF_PROVIDER".to_string(), provider);
    }
    Ok(Config::from_env_with(overrides)?)
}

#[cfg(feature = "mcp")]
fn run_mcp_server(config: Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mcp::run_mcp_server(config))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(config: &Config) {
    use colored::Colorize;

    let store_path = std::fs::canonicalize(&config.store_path)
        .unwrap_or_else(|_| config.store_path.clone())
        .display()
        .to_string();

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "shelf".to_string());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "shelf": {{
      "command": "{}",
      "args": ["--store", "{}", "mcp"],
      "env": {{ "OPENAI_API_KEY": "<your key>" }}
    }}
  }}
}}"#, binary_path, store_path);
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Context string for a question", "kb_context".green());
    println!("  • {} - Ranked results with scores", "kb_search".green());
    println!("  • {} - Knowledge base statistics", "kb_status".green());
}
