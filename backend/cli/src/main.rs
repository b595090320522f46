mod draft_cmd;
mod status_cmd;
mod terminal_output;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use patentflow_client::StreamingClient;
use patentflow_completion::{CompletionSource, MockModel, OpenAiCompatProvider};
use patentflow_config::AppConfig;
use patentflow_core::{CompletionModel, OptimizationType};
use patentflow_gateway::{start_server, GatewayState};
use patentflow_logging::init_logger;

#[derive(Parser)]
#[command(name = "patentflow")]
#[command(about = "PatentFlow: streamed AI drafting for patent technical disclosures")]
#[command(version)]
struct Cli {
    /// Gateway URL for client commands (default: http://127.0.0.1:<PATENTFLOW_PORT>)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the PatentFlow gateway
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Override OPENAI_BASE_URL
        #[arg(long)]
        base_url: Option<String>,
        /// Answer from a scripted offline model instead of the upstream API
        #[arg(long)]
        mock: bool,
    },
    /// Optimize a technical solution text
    Optimize {
        text: String,
        /// standard, detailed, concise or legal
        #[arg(short = 't', long = "type", default_value = "standard")]
        optimization_type: String,
    },
    /// Generate beneficial effects and protection points
    Effects {
        #[arg(long)]
        background: String,
        #[arg(long)]
        solution: String,
    },
    /// Generate the background section
    Background {
        #[arg(long)]
        name: String,
        #[arg(long)]
        field: String,
        #[arg(long, default_value = "")]
        problems: String,
    },
    /// Recommend related search keywords
    Keywords {
        keyword: String,
        #[arg(long)]
        field: Option<String>,
        #[arg(long)]
        count: Option<u32>,
        /// Wait for the complete list instead of streaming
        #[arg(long)]
        list: bool,
    },
    /// Check local configuration and gateway health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    init_logger(&config.log_dir, &config.log_level);

    let server = cli
        .server
        .unwrap_or_else(|| format!("http://127.0.0.1:{}", config.port));

    match cli.command {
        Commands::Serve { port, base_url, mock } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            run_server(config, mock).await?;
        }
        Commands::Status => status_cmd::run(&config, &server).await?,
        Commands::Optimize {
            text,
            optimization_type,
        } => {
            let client = StreamingClient::new(server);
            draft_cmd::optimize(&client, &text, OptimizationType::parse(&optimization_type)).await?;
        }
        Commands::Effects {
            background,
            solution,
        } => draft_cmd::effects(&StreamingClient::new(server), &background, &solution).await?,
        Commands::Background {
            name,
            field,
            problems,
        } => draft_cmd::background(&StreamingClient::new(server), &name, &field, &problems).await?,
        Commands::Keywords {
            keyword,
            field,
            count,
            list,
        } => {
            let client = StreamingClient::new(server);
            draft_cmd::keywords(&client, &keyword, field.as_deref(), count, list).await?;
        }
    }

    Ok(())
}

async fn run_server(config: AppConfig, mock: bool) -> Result<()> {
    let report = config.validate();
    for warning in &report.warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!(path = %err.path, "{}", err.message);
        }
        bail!("configuration has {} error(s)", report.errors.len());
    }

    info!(config = %config.redacted(), mock, "Starting PatentFlow gateway");

    let model_config = Arc::new(config.model_config());
    let model: Arc<dyn CompletionModel> = if mock {
        Arc::new(
            MockModel::new("mock")
                .with_fragments(["（离线模式）", "这是一段", "模拟生成的文本。"])
                .with_fragment_delay(Duration::from_millis(50)),
        )
    } else {
        Arc::new(OpenAiCompatProvider::new(&model_config))
    };

    let state = GatewayState::new(CompletionSource::new(model, model_config))
        .with_char_delay(config.char_delay());
    let addr: SocketAddr = config
        .socket_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.socket_address()))?;

    start_server(addr, state).await
}
