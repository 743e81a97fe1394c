//! Wayfarer CLI — the main entry point.
//!
//! Commands:
//! - `serve` — start the HTTP/SSE gateway with the embedded agent service
//! - `chat`  — process a single message and print the trace and answer

use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use wayfarer_agent::LoopConfig;
use wayfarer_config::AppConfig;
use wayfarer_gateway::GatewayState;
use wayfarer_providers::ModelManager;
use wayfarer_service::{AgentService, MessageRequest};

#[derive(Parser)]
#[command(
    name = "wayfarer",
    about = "Wayfarer — LLM-backed travel assistant agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "wayfarer.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway HTTP server
    Serve {
        /// Override the gateway port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Process a single message
    Chat {
        /// The message to send
        #[arg(short, long)]
        message: String,

        /// Execution mode: direct | react | plan
        #[arg(long, default_value = "react")]
        mode: String,

        /// Model id (defaults to the configured default)
        #[arg(long, default_value = "")]
        model: String,
    },
}

fn loop_config(config: &AppConfig) -> LoopConfig {
    LoopConfig {
        max_steps: config.agent.max_steps,
        max_reasoning_depth: config.agent.max_reasoning_depth,
        task_deadline: (config.agent.task_deadline_secs > 0)
            .then(|| Duration::from_secs(config.agent.task_deadline_secs)),
    }
}

fn build_service(config: &AppConfig) -> (Arc<AgentService>, Arc<ModelManager>) {
    let models = Arc::new(ModelManager::from_config(config));
    let registry = Arc::new(wayfarer_tools::default_registry());
    let service = Arc::new(AgentService::new(
        models.clone(),
        registry,
        loop_config(config),
    ));
    (service, models)
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

    let config = AppConfig::load_or_default(&cli.config)?;
    info!(config = %cli.config, default_model = %config.default_model, "Configuration loaded");

    match cli.command {
        Commands::Serve { port } => {
            let (service, models) = build_service(&config);
            let state = Arc::new(GatewayState {
                service,
                sessions: Arc::new(wayfarer_core::session::SessionStore::new(
                    config.default_model.clone(),
                )),
                models,
            });
            let port = port.unwrap_or(config.gateway.port);
            wayfarer_gateway::start(state, &config.gateway.host, port).await?;
        }
        Commands::Chat { message, mode, model } => {
            let (service, _) = build_service(&config);
            let response = service
                .process_message(MessageRequest {
                    session_id: String::new(),
                    user_input: message,
                    model_id: model,
                    mode,
                    stream: false,
                })
                .await;

            if !response.reasoning.text.is_empty() {
                println!("{}", response.reasoning.text);
            }
            if response.success {
                println!("{}", response.answer);
            } else {
                eprintln!(
                    "error: {}",
                    response.error.unwrap_or_else(|| "unknown".into())
                );
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
