use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    error::{AppError, Result},
    service::CallbackResult,
};

#[derive(Debug, Deserialize)]
pub struct SuccessParams {
    session_id: String,
}

pub async fn success(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(booking_id): Path<Uuid>,
    Query(params): Query<SuccessParams>,
) -> Result<Json<CallbackResult>> {
    let result = state.service_context.payment_service
        .handle_success(booking_id, &params.session_id, &current_user.user)
        .await?;

    Ok(Json(result))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CallbackResult>> {
    let result = state.service_context.payment_service
        .handle_cancel(booking_id, &current_user.user)
        .await?;

    Ok(Json(result))
}

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing Stripe signature".to_string()))?;

    state.service_context.payment_service
        .handle_webhook(&body, signature)
        .await?;

    Ok(StatusCode::OK)
}
