use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use staybook::{
    api,
    auth::AuthService,
    config::Settings,
    notify::{ConsoleNotifier, Notifier, SmtpNotifier},
    payments::{PaymentGateway, StripeGateway},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staybook=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Staybook server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let auth_service = Arc::new(AuthService::new(
        db_pool.clone(),
        settings.auth.session_duration_hours,
        settings.auth.secure_cookies,
    ));

    match auth_service.cleanup_expired_sessions().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} expired sessions", n),
        Err(e) => tracing::warn!("Session cleanup failed: {}", e),
    }

    // Initialize Stripe if configured
    let gateway: Option<Arc<dyn PaymentGateway>> = if settings.stripe.enabled {
        if let (Some(api_key), Some(webhook_secret)) =
            (settings.stripe.secret_key.clone(), settings.stripe.webhook_secret.clone()) {
            tracing::info!("Stripe payment processing enabled");
            Some(Arc::new(StripeGateway::new(api_key, webhook_secret)))
        } else {
            tracing::warn!("Stripe enabled but missing configuration");
            None
        }
    } else {
        tracing::info!("Stripe payment processing disabled");
        None
    };

    let notifier: Arc<dyn Notifier> = match settings.email.smtp.clone() {
        Some(smtp) => {
            tracing::info!("Sending verification email via SMTP ({})", smtp.host);
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        None => {
            tracing::info!("No SMTP configured; verification links will be logged");
            Arc::new(ConsoleNotifier::new())
        }
    };

    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        auth_service,
        gateway,
        notifier,
        &settings,
    ));

    match service_context.checkout_service.purge_expired().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} expired checkout selections", n),
        Err(e) => tracing::warn!("Checkout selection cleanup failed: {}", e),
    }

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
