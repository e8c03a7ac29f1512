use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::GatewayError;

/// Request-level failures surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum WebError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl WebError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failure",
            Self::Gateway(err) => err.kind(),
        }
    }
}

impl ResponseError for WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Gateway(GatewayError::ValidationFailure(_)) => {
                StatusCode::BAD_REQUEST
            }
            Self::Gateway(GatewayError::ConnectionFailure { .. })
            | Self::Gateway(GatewayError::DeliveryFailure { .. }) => StatusCode::BAD_GATEWAY,
            Self::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}
