use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod admin;
mod error;
mod state;
mod views;

pub use admin::{AuthRequest, AuthResponse, SessionResponse};
pub use error::*;
pub use state::*;
pub use views::{BatchResponse, TrackResponse, ViewsResponse, MAX_BATCH};

pub fn create_router(app: App) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health))
        .route("/views/track", post(views::track))
        .route("/views/batch", post(views::batch).get(views::batch_query))
        .route("/views/", get(views::missing_slug))
        .route("/views/:slug", get(views::views))
        .route("/admin/auth", post(admin::authenticate))
        .route("/admin/session", get(admin::session))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(app)
}

async fn health() -> Json<Value> {
    Json(json!({ "success": true }))
}
