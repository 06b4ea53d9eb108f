use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod analysis;
mod api;
mod config;
mod error;
mod generation;
mod prompt;
mod service;

use crate::analysis::DocumentIntelligenceClient;
use crate::api::AppState;
use crate::config::AppConfig;
use crate::generation::GeminiClient;
use crate::service::EvaluationService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!(
        "Starting exam evaluator service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = AppConfig::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        analysis_model = %config.document_intelligence.model_id,
        generation_model = %config.generation.model,
        "Configuration loaded"
    );

    // Missing credentials only fail the requests that need them
    for setting in config.missing_credentials() {
        warn!(setting, "Credential not configured; evaluations will fail");
    }

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics recorder not installed");
            None
        }
    };

    let analyzer = Arc::new(DocumentIntelligenceClient::new(
        config.document_intelligence.clone(),
    )?);
    let generator = Arc::new(GeminiClient::new(config.generation.clone())?);
    let service = Arc::new(EvaluationService::new(analyzer, generator));

    let app = api::router(
        AppState {
            service,
            start_time: Instant::now(),
            metrics,
        },
        &config.cors,
    );

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("exam_evaluator_service=info,tower_http=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
