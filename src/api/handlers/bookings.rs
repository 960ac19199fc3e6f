use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Booking, BookingDetail},
    error::Result,
    service::{PayRequest, PayResponse, VerifyResult},
};

#[derive(Debug, Serialize)]
pub struct ListResponse {
    bookings: Vec<Booking>,
    total: usize,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    token: String,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<ListResponse>> {
    let bookings = state.service_context.booking_service
        .list_for_user(&current_user.user)
        .await?;

    let total = bookings.len();

    Ok(Json(ListResponse { bookings, total }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDetail>> {
    let detail = state.service_context.booking_service
        .get_detail(id, &current_user.user)
        .await?;

    Ok(Json(detail))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<VerifyResult>> {
    let result = state.service_context.verification_service
        .verify(id, &params.token, &current_user.user)
        .await?;

    Ok(Json(result))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.service_context.verification_service
        .resend_verification(id, &current_user.user)
        .await?;

    Ok(StatusCode::ACCEPTED)
}

pub async fn pay(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<PayRequest>,
) -> Result<Json<PayResponse>> {
    let response = state.service_context.payment_service
        .pay(id, &current_user.user, req)
        .await?;

    Ok(Json(response))
}
