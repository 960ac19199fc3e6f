use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Booking, BookingStatus, GatewayPayment},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    bookings: Vec<Booking>,
    total: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub admin_notes: Option<String>,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let bookings = state.service_context.booking_service
        .list_bookings(params.limit, params.offset)
        .await?;

    let total = bookings.len();

    Ok(Json(ListResponse { bookings, total }))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>> {
    let booking = state.service_context.booking_service
        .set_booking_status(id, req.status)
        .await?;

    tracing::info!("Admin {} set booking {} to {}", admin.user.email, id, req.status.as_str());

    Ok(Json(booking))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Extension(admin): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    req: Option<Json<ConfirmPaymentRequest>>,
) -> Result<Json<GatewayPayment>> {
    let req = req.map(|Json(r)| r).unwrap_or_default();

    let payment = state.service_context.payment_service
        .confirm_offline_payment(id, req.admin_notes)
        .await?;

    tracing::info!("Admin {} confirmed payment {}", admin.user.email, id);

    Ok(Json(payment))
}
