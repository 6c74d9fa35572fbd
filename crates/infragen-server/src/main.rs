mod api_types;
mod config;
mod error;
mod routes;
mod state;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;
    let project = state::load_project(&cfg)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&project.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = state::AppState::init(project)?;

    let mut app = routes::create_router(state).layer(TraceLayer::new_for_http());
    if cfg.server.permissive_cors {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = &cfg.server.bind;
    tracing::info!("infragen-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
