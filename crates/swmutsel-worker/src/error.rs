use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use swmutsel_core::error::SelError;
use swmutsel_protocol::protocol::ErrorResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Model(#[from] SelError),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A call arrived before the state it needs was sent.
    #[error("Worker not ready: {0}")]
    NotReady(&'static str),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let zero_likelihood = matches!(&self, AppError::Model(e) if e.is_zero_likelihood());
        let (status, msg) = match self {
            AppError::Model(e) => match e.root_cause() {
                SelError::InvalidParameter(_)
                | SelError::TaxonMismatch(_)
                | SelError::Tree(_)
                | SelError::Config(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                _ => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            },
            AppError::Validation(s) => (StatusCode::BAD_REQUEST, s),
            AppError::NotReady(what) => (StatusCode::CONFLICT, format!("{} has not been set", what)),
            AppError::Internal(e) => {
                tracing::error!("Internal Error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e)
            }
        };

        let body = ErrorResponse {
            error: msg,
            zero_likelihood,
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
