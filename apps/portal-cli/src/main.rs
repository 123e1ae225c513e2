use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use common_registry::{init_session_db, HttpRegistry, Session, SessionSlot};

mod cli;
mod commands;
mod config;

use cli::Cli;
use config::{PortalConfig, DEFAULT_LOG_FILTER, LOG_FILTER_VAR};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Logs vão para stderr; stdout fica com a saída dos comandos
fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_FILTER_VAR)
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = PortalConfig::resolve(&cli);
    init_tracing(config.log_json)?;

    info!(
        "portal {} ({} {})",
        built_info::PKG_VERSION,
        built_info::PROFILE,
        built_info::TARGET
    );
    debug!("Registry em {}", config.registry.base_url);

    let pool = init_session_db(&config.session_db)
        .await
        .context("Falha ao abrir a sessão local")?;
    let mut session = Session::restore(SessionSlot::new(pool)).await?;
    let registry = Arc::new(HttpRegistry::new(&config.registry)?);

    let mut stdout = std::io::stdout();
    match commands::run(cli.command, registry, &mut session, &mut stdout).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(failure) => {
            let code = commands::report(&failure, &mut std::io::stderr()).unwrap_or(1);
            Ok(ExitCode::from(code))
        }
    }
}
