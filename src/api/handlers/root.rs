use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Staybook API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Booking checkout and milestone payments",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "auth": "/auth/login",
            "checkout": "/api/checkout",
            "bookings": "/api/bookings",
            "admin": "/admin"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
