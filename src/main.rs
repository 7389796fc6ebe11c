use anyhow::{Context, Result};
use docdigest::{api, config, logging, processing::ProcessingService};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::init_config().context("failed to load configuration")?;
    // The .env file read by init_config may carry RUST_LOG and DOCDIGEST_LOG_FILE.
    logging::init_tracing();
    config.log_summary();

    let service = ProcessingService::from_config(config)
        .context("failed to initialize summarization pipeline")?;
    let app = api::create_router(Arc::new(service), config.max_upload_bytes);

    let port = config.server_port;
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app)
        .await
        .context("HTTP server terminated unexpectedly")?;
    Ok(())
}
