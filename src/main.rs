use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_announce::{
    build_router,
    config::Config,
    services::fallback::{ensure_fallback, fallback_path, spawn_mirror},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if config.admin_api_key.is_none() {
        warn!("ADMIN_API_KEY not set; announcement mutations will be refused");
    }

    let state = AppState::new(config);

    let fallback = fallback_path(&state.config.static_dir);
    match ensure_fallback(&fallback, &state.store).await {
        Ok(()) => info!("Static fallback at {}", fallback.display()),
        Err(e) => warn!("Could not prepare static fallback {}: {e}", fallback.display()),
    }
    if state.config.mirror_fallback {
        spawn_mirror(state.store.clone(), fallback);
    }

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let app = build_router(state);

    info!("Announcement API listening on {}", addr);
    info!("  GET    /api/announcements      current announcement");
    info!("  POST   /api/announcements      create/replace (X-API-Key)");
    info!("  DELETE /api/announcements      disable (X-API-Key)");
    info!("  GET    /api/announcements/ws   push channel");
    info!("  GET    /api/health             health check");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
