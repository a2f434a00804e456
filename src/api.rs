pub(crate) mod admin;
pub(crate) mod auth;
pub(crate) mod health;
pub(crate) mod metrics;
pub(crate) mod youtube;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/admin/tasks/{task}", post(admin::run_task))
        .route("/auth/oauth/callback", get(auth::oauth_callback))
        .route("/youtube/playlists", get(youtube::list_playlists))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
