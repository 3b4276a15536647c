//! lingxi CLI — the main entry point.
//!
//! Commands:
//! - `serve` — Start the HTTP gateway
//! - `ask`   — Run one request through the pipeline and print the result
//! - `tools` — List registered capabilities
//! - `init`  — Print a sample configuration file

use clap::{Parser, Subcommand};
use lingxi_agent::Orchestrator;
use lingxi_config::AppConfig;
use lingxi_oracle::OpenAiCompatOracle;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "lingxi",
    about = "lingxi — LLM tool-orchestration service",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the listen host
        #[arg(long)]
        host: Option<String>,

        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run one request through the pipeline and print the response
    Ask {
        /// The natural-language request, e.g. "查北京天气"
        input: String,

        /// Print the full workflow response instead of just the result
        #[arg(long)]
        full: bool,
    },

    /// List registered capabilities
    Tools,

    /// Print a sample configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = AppConfig::load()?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            lingxi_gateway::start(config).await?;
        }
        Commands::Ask { input, full } => {
            let config = AppConfig::load()?;
            let orchestrator = build_orchestrator(&config);
            let response = orchestrator.execute(&input, None).await;
            if full {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", response.result.summary);
            }
        }
        Commands::Tools => {
            let config = AppConfig::load()?;
            let oracle = Arc::new(OpenAiCompatOracle::from_config(&config.oracle));
            let registry = lingxi_tools::default_registry(&config, oracle);
            for descriptor in registry.descriptors() {
                println!(
                    "{:<12} {}  (required: {}; optional: {})",
                    descriptor.name,
                    descriptor.description,
                    descriptor.required_params.join(", "),
                    if descriptor.optional_params.is_empty() {
                        "-".to_string()
                    } else {
                        descriptor.optional_params.join(", ")
                    },
                );
            }
        }
        Commands::Init => {
            print!("{}", AppConfig::default_toml());
        }
    }

    Ok(())
}

fn build_orchestrator(config: &AppConfig) -> Orchestrator {
    let oracle = Arc::new(OpenAiCompatOracle::from_config(&config.oracle));
    let registry = Arc::new(lingxi_tools::default_registry(config, oracle.clone()));
    Orchestrator::new(oracle, registry).with_max_chain_steps(config.tools.max_chain_steps)
}
