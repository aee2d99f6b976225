use clap::Parser;
use resource_reconciler::cli::{Cli, Commands, ConfigAction};
use resource_reconciler::config::{validate_config, Config, DEFAULT_CONFIG_FILE, MAX_EVENT_BYTES};
use resource_reconciler::gateway::GatewayServer;
use resource_reconciler::logging;
use resource_reconciler::providers::resolve_providers;
use resource_reconciler::reconcile::Dispatcher;

use anyhow::{bail, Context};
use serde_json::json;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Handle(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            logging::init_with(&config.logging);

            let raw = read_event(opts.event.as_deref()).await?;
            let dispatcher = Dispatcher::from_providers(resolve_providers(&config)?);

            match dispatcher.handle_json(&raw).await {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(err) => {
                    let body = json!({"error": {"code": err.code(), "message": err.to_string()}});
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    std::process::exit(1);
                }
            }
        }
        Commands::Serve(opts) => {
            let config = Config::load(opts.config.as_deref())?;
            logging::init_with(&config.logging);

            info!("Starting resource reconciler gateway");
            let dispatcher = Arc::new(Dispatcher::from_providers(resolve_providers(&config)?));
            let server = GatewayServer::start(&config, &opts, dispatcher).await?;
            server.run_until_shutdown().await?;
        }
        Commands::Config(opts) => {
            logging::init();
            match opts.action {
                ConfigAction::Show => {
                    let config = Config::load(opts.config.as_deref())?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Validate => {
                    let config = Config::load(opts.config.as_deref())?;
                    let errors = validate_config(&config);
                    if errors.is_empty() {
                        info!("Configuration is valid");
                    } else {
                        for e in &errors {
                            error!("{}", e);
                        }
                        bail!("Configuration has {} error(s)", errors.len());
                    }
                }
                ConfigAction::Init => {
                    let path = opts.config.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);
                    if std::path::Path::new(path).exists() {
                        bail!("Refusing to overwrite existing config file '{}'", path);
                    }
                    Config::write_default(path)?;
                    info!("Configuration file created at {}", path);
                }
            }
        }
        Commands::Version => {
            println!("resource-reconciler {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Read an event from a file, or from stdin for `-` or no path.
async fn read_event(path: Option<&str>) -> anyhow::Result<String> {
    let mut raw = String::new();
    match path {
        None | Some("-") => {
            tokio::io::stdin()
                .take(MAX_EVENT_BYTES as u64 + 1)
                .read_to_string(&mut raw)
                .await
                .context("Failed to read event from stdin")?;
        }
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open event file '{path}'"))?;
            file.take(MAX_EVENT_BYTES as u64 + 1)
                .read_to_string(&mut raw)
                .await
                .with_context(|| format!("Failed to read event file '{path}'"))?;
        }
    }

    if raw.len() > MAX_EVENT_BYTES {
        bail!("Event exceeds limit of {} bytes", MAX_EVENT_BYTES);
    }
    Ok(raw)
}
