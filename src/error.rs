use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authorization code missing from callback query")]
    MissingCode,

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("No seed tracks survived resolution")]
    NoSeedTracks,

    #[error("Provider API error: {0}")]
    ProviderApi(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AppError {
    /// Stable machine-readable code included in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingCode => "missing_code",
            AppError::TokenExchange(_) => "token_exchange_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Inference(_) => "inference_error",
            AppError::NoSeedTracks => "no_seed_tracks",
            AppError::ProviderApi(_) => "provider_api_error",
            AppError::Timeout(_) => "timeout",
            AppError::Network(_) => "network_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::MissingCode => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NoSeedTracks => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Network(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            AppError::TokenExchange(_)
            | AppError::Inference(_)
            | AppError::ProviderApi(_)
            | AppError::Network(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!("Request failed ({}): {}", self.code(), self);

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
