use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};

use crate::config::{self, AppConfig};
use crate::database::{DatabaseManager, RelationStores};
use crate::routes;
use crate::services::transformer;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "forest-watcher-bff")]
#[command(about = "Forest Watcher API - areas, teams and report templates")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Override the configured port")]
        port: Option<u16>,
    },

    #[command(about = "Link every area to the template ids it carries, then exit")]
    Transform,

    #[command(about = "Create the relation tables in DATABASE_URL, then exit")]
    Migrate,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::config().clone();
    tracing::info!("Starting Forest Watcher API in {:?} mode", config.environment);

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(config, port).await,
        Commands::Transform => transform(config, cli.json).await,
        Commands::Migrate => migrate(config).await,
    }
}

async fn serve(mut config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.service.port = port;
    }

    let relations = RelationStores::open(&config.database)
        .await
        .context("failed to open relation store")?;
    let bind_addr = format!("0.0.0.0:{}", config.service.port);
    let state = AppState::new(config, relations).context("failed to build HTTP client")?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Forest Watcher API listening on http://{}", bind_addr);

    axum::serve(listener, routes::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn transform(config: AppConfig, json: bool) -> anyhow::Result<()> {
    if config.upstream.service_token.is_empty() {
        return Err(anyhow!("MICROSERVICE_TOKEN is required to list every area"));
    }

    let relations = RelationStores::open(&config.database).await?;
    let state = AppState::new(config, relations)?;
    let upstream = state.upstream(None).as_service();

    let report = transformer::run(&upstream, &state.relations).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Checked {} areas: {} template relations created, {} already present",
            report.areas, report.created, report.skipped
        );
    }
    Ok(())
}

async fn migrate(config: AppConfig) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(&pool).await?;
    println!("Relation tables are up to date");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
}
