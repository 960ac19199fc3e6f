use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid verification token")]
    InvalidToken,

    #[error("Booking is already verified")]
    AlreadyVerified,

    #[error("Pricing unavailable: {0}")]
    PricingUnavailable(String),

    #[error("Booking creation failed")]
    BookingCreationFailed,

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error occurred")
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            AppError::Validation(ref msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.as_str()),
            AppError::InvalidToken => (
                StatusCode::BAD_REQUEST,
                "Invalid or expired verification link. Please request a new one.",
            ),
            AppError::AlreadyVerified => (StatusCode::CONFLICT, "Booking is already verified"),
            AppError::PricingUnavailable(ref msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg.as_str())
            }
            AppError::BookingCreationFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "We could not create your booking. Please try again.",
            ),
            AppError::PaymentGateway(ref msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Payment provider unavailable. Your booking is saved; please retry payment.",
                )
            }
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.as_str()),
            AppError::Notification(ref msg) => {
                tracing::error!("Notification error: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Could not send email, please retry")
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}
