use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::identity::IdentityError;
use crate::models::ids::DriverId;
use crate::models::order::OrderStatus;
use crate::store::StoreError;

/// Rejections produced by the order lifecycle.
#[derive(Debug, Error, PartialEq)]
pub enum LifecycleError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("driver {0} already has an active order")]
    DriverUnavailable(DriverId),

    #[error("order locked: {0}")]
    OrderLocked(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(String),
}

impl LifecycleError {
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleError::Validation(_) => "validation_error",
            LifecycleError::Unauthorized(_) => "unauthorized",
            LifecycleError::InvalidTransition { .. } => "invalid_transition",
            LifecycleError::DriverUnavailable(_) => "driver_unavailable",
            LifecycleError::OrderLocked(_) => "order_locked",
            LifecycleError::NotFound(_) => "not_found",
            LifecycleError::Conflict(_) => "conflict",
            LifecycleError::Store(_) => "store_error",
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => LifecycleError::NotFound(what),
            StoreError::Conflict(msg) => LifecycleError::Conflict(msg),
            StoreError::DriverBusy(driver_id) => LifecycleError::DriverUnavailable(driver_id),
            other => LifecycleError::Store(other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials | IdentityError::RoleMismatch { .. } => {
                AppError::Unauthenticated(err.to_string())
            }
            IdentityError::NotConfigured => AppError::Internal(err.to_string()),
            IdentityError::Upstream(msg) => AppError::Upstream(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            AppError::Lifecycle(err) => {
                let status = match err {
                    LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
                    LifecycleError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    LifecycleError::InvalidTransition { .. }
                    | LifecycleError::DriverUnavailable(_)
                    | LifecycleError::Conflict(_) => StatusCode::CONFLICT,
                    LifecycleError::OrderLocked(_) => StatusCode::LOCKED,
                    LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                    LifecycleError::Store(_) => StatusCode::BAD_GATEWAY,
                };
                (status, err.kind())
            }
            AppError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        let body = Json(json!({
            "error": self.to_string(),
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
