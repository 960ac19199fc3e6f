pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Auth routes
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))

        // API routes
        .nest("/api", api_routes(app_state.clone()))

        // Admin routes
        .nest("/admin", admin_routes(app_state.clone()))

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/checkout", checkout_routes(state.clone()))
        .nest("/bookings", booking_routes(state.clone()))
        .nest("/payments", payment_routes(state))
}

fn checkout_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::checkout::submit))
        .route("/selection", post(handlers::checkout::save_selection))
        .route("/selection/:id", get(handlers::checkout::get_selection))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn booking_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::bookings::list))
        .route("/:id", get(handlers::bookings::get))
        .route("/:id/verify", get(handlers::bookings::verify))
        .route("/:id/resend-verification", post(handlers::bookings::resend_verification))
        .route("/:id/pay", post(handlers::bookings::pay))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Gateway calls this directly; authenticity comes from the signature
        .route("/webhook/stripe", post(handlers::payments::stripe_webhook))
        .merge(Router::new()
            .route("/:booking_id/success", get(handlers::payments::success))
            .route("/:booking_id/cancel", get(handlers::payments::cancel))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::auth::require_auth,
            ))
        )
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings", get(handlers::admin::list_bookings))
        .route("/bookings/:id/status", put(handlers::admin::update_status))
        .route("/payments/:id/confirm", post(handlers::admin::confirm_payment))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}
