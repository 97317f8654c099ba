use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use crate::error::AppError;
use crate::identity::{Credentials, IdentityError, LoginResponse};
use crate::models::actor::{Actor, Role};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login/:role", post(login))
        .route("/logout", post(logout))
}

/// Caller resolved from the `Authorization: Bearer` header through the
/// session registry.
pub struct AuthActor {
    pub actor: Actor,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthenticated("missing bearer token".to_string()))?;
        let actor = state
            .sessions
            .resolve(token)
            .ok_or_else(|| AppError::Unauthenticated("unknown or expired session".to_string()))?;

        Ok(Self {
            actor,
            token: token.to_string(),
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn login(
    State(state): State<Arc<AppState>>,
    Path(role): Path<String>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<LoginResponse>, AppError> {
    let role: Role = role.parse().map_err(AppError::BadRequest)?;
    let provider = state.identity.as_ref().ok_or(IdentityError::NotConfigured)?;

    let login = provider.login(role, &credentials).await?;
    let actor = state.sessions.register(&login);
    state.metrics.active_sessions.set(state.sessions.len() as i64);

    info!(actor_id = %actor.id, role = %actor.role, "session opened");
    Ok(Json(login))
}

async fn logout(State(state): State<Arc<AppState>>, auth: AuthActor) -> StatusCode {
    state.sessions.revoke(&auth.token);
    state.metrics.active_sessions.set(state.sessions.len() as i64);

    info!(actor_id = %auth.actor.id, "session closed");
    StatusCode::NO_CONTENT
}
