use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    error::Result,
    service::{SavedSelection, SelectionRequest, SubmitBookingRequest, SubmittedBooking},
};

pub async fn save_selection(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<SelectionRequest>,
) -> Result<(StatusCode, Json<SavedSelection>)> {
    let saved = state.service_context.checkout_service
        .save_selection(&current_user.user, req)
        .await?;

    Ok((StatusCode::CREATED, Json(saved)))
}

/// Re-prices a saved selection against the current catalog.
pub async fn get_selection(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SavedSelection>> {
    let checkout = &state.service_context.checkout_service;

    let selection = checkout.get_selection(&current_user.user, id).await?;
    let quote = checkout.preview(&selection).await?;

    Ok(Json(SavedSelection { selection, quote }))
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<SubmitBookingRequest>,
) -> Result<(StatusCode, Json<SubmittedBooking>)> {
    let submitted = state.service_context.booking_service
        .checkout(&current_user.user, req)
        .await?;

    Ok((StatusCode::CREATED, Json(submitted)))
}
