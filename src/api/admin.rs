use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::state::App;
use crate::auth::AuthError;

#[derive(Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest").finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[instrument(skip_all)]
pub async fn authenticate(
    State(app): State<App>,
    WithRejection(Json(request), _): WithRejection<Json<AuthRequest>, AuthError>,
) -> Result<Json<AuthResponse>, AuthError> {
    let token = app.auth().authenticate(&request.password)?;
    tracing::info!("admin authenticated");

    Ok(Json(AuthResponse {
        success: true,
        authenticated: true,
        token,
    }))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub authenticated: bool,
    pub expires_at: i64,
}

#[instrument(skip_all)]
pub async fn session(
    State(app): State<App>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AuthError> {
    let session = app.auth().verify(&headers)?;

    Ok(Json(SessionResponse {
        success: true,
        authenticated: true,
        expires_at: session.claims.exp,
    }))
}
