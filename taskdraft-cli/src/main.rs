use clap::Parser;
use std::sync::Arc;
use taskdraft_cli::config::{AppConfig, Cli, Command};
use taskdraft_cli::server::{build_orchestrator, start_server};
use taskdraft_core::domain::GenerationRequest;
use taskdraft_core::logging::{SharedEventLogger, TracingEventLogger};
use taskdraft_core::registry::ProviderRegistry;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.clone().into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli)?;
    match cli.command.clone().unwrap_or(Command::Serve {
        host: None,
        port: None,
        cors_origin: None,
    }) {
        Command::Serve { .. } => start_server(config).await,
        Command::Generate { text } => {
            let request = GenerationRequest::new(&text)?;
            let logger: SharedEventLogger = Arc::new(TracingEventLogger);
            let outcome = build_orchestrator(&config, logger).generate(&request).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success() {
                std::process::exit(2);
            }
            Ok(())
        }
        Command::Providers => {
            let registry = ProviderRegistry::from_env(&config.providers);
            if registry.is_empty() {
                println!("no providers configured");
            }
            for label in registry.labels() {
                println!("{label}");
            }
            Ok(())
        }
    }
}
