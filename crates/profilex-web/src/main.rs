mod api;
mod config;
mod state;

use anyhow::Context;
use axum::Router;
use profilex_core::{ProfilePipeline, Settings};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "profilex_web=debug,profilex_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env().context("Invalid configuration")?;
    let server = ServerConfig::from_env()?;

    let pipeline =
        ProfilePipeline::from_settings(&settings).context("Failed to build extraction pipeline")?;
    tracing::info!(
        renderer = pipeline.renderer_name(),
        model = %settings.provider.model,
        output_dir = %settings.output_dir.display(),
        "Pipeline ready"
    );

    let app = Router::new()
        .nest("/api", api::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(pipeline));

    tracing::info!("Starting profilex on http://{}", server.bind);

    let listener = tokio::net::TcpListener::bind(server.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
