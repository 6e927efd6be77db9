use axum::Router;

use crate::AppState;

pub mod connections;
pub mod health;
pub mod notifications;
pub mod profile;
pub mod webhooks;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/api",
        connections::router(state)
            .merge(notifications::router(state))
            .merge(profile::router(state))
            .merge(webhooks::router(state))
            .merge(health::router(state)),
    )
}
