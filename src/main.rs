use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gbindex::{
    Config,
    catalog::Catalog,
    config::{Cli, Command, FormatArgs},
    formats::format_bed,
    handlers::{AppState, create_router},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| cli.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Serve(config) => serve(config).await,
        Command::Format(args) => run_format(args).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let catalog = Arc::new(Catalog::new(config.data_dir.clone(), config.max_open_files));
    let state = AppState { catalog };

    let app = create_router(state);
    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = config.bind_address();
    tracing::info!("Starting gbindex server on {}", addr);
    tracing::info!("Data directory: {:?}", config.data_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_format(args: FormatArgs) -> anyhow::Result<()> {
    let options = args.options();
    let summary = tokio::task::spawn_blocking(move || format_bed(&args.input, &args.output, &options))
        .await??;
    tracing::info!(
        "indexed {} records on {} references ({} bytes)",
        summary.records,
        summary.references,
        summary.bytes
    );
    Ok(())
}
