mod auth;
mod config;
mod error;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use db::DBService;
use services::services::notification::NotificationService;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub config: Arc<Config>,
    pub notifications: NotificationService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    utils::log::init();

    let config = Config::from_env()?;
    let db = DBService::new(&config.database_url)
        .await
        .context("failed to open database")?;
    let notifications = NotificationService::new(db.clone());
    let state = AppState {
        db,
        config: Arc::new(config),
        notifications,
    };

    let app = routes::router(&state)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
