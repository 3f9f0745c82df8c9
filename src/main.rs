use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use membership_engine::adapters::auth::JwtSessionValidator;
use membership_engine::adapters::http::{membership_router, MembershipAppState, MembershipPorts};
use membership_engine::adapters::postgres::{
    run_migrations, PostgresCouponStore, PostgresGiftCardStore, PostgresIntentRepository,
    PostgresPaymentHistoryRepository, PostgresProfileRepository, PostgresUserMembershipRepository,
    PostgresWebhookEventRepository,
};
use membership_engine::adapters::stripe::{
    StripeConfig, StripeIdentityAdapter, StripePaymentAdapter,
};
use membership_engine::application::{CheckoutSettings, SweepPolicy};
use membership_engine::config::{AppConfig, ServerConfig};
use membership_engine::domain::foundation::Timestamp;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    // Database
    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
        tracing::info!("Migrations applied");
    }

    // Providers
    let stripe = StripeConfig::from_payment_config(&config.payment);
    let payment_provider = Arc::new(StripePaymentAdapter::new(stripe.clone())?);
    let identity_verifier = Arc::new(StripeIdentityAdapter::new(&stripe)?);
    let validator = Arc::new(JwtSessionValidator::from_config(&config.auth));

    let ports = MembershipPorts {
        intents: Arc::new(PostgresIntentRepository::new(pool.clone())),
        memberships: Arc::new(PostgresUserMembershipRepository::new(pool.clone())),
        profiles: Arc::new(PostgresProfileRepository::new(pool.clone())),
        coupons: Arc::new(PostgresCouponStore::new(pool.clone())),
        gift_cards: Arc::new(PostgresGiftCardStore::new(pool.clone())),
        payments: Arc::new(PostgresPaymentHistoryRepository::new(pool.clone())),
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool.clone())),
        payment_provider,
        identity_verifier,
    };
    let state = MembershipAppState::new(
        ports,
        CheckoutSettings {
            success_url: config.payment.checkout_success_url.clone(),
            cancel_url: config.payment.checkout_cancel_url.clone(),
            currency: config.payment.currency.clone(),
        },
        config.identity.verification_return_url.clone(),
    );

    spawn_sweep(&state, &config);

    let app = membership_router(validator)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, environment = ?config.server.environment, "membership-engine listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if server.is_production() {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Runs the stale-intent sweep on a fixed interval until shutdown.
fn spawn_sweep(state: &MembershipAppState, config: &AppConfig) {
    let sweep = state.sweep_handler(SweepPolicy::from(&config.lifecycle));
    let mut ticker = tokio::time::interval(config.lifecycle.sweep_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            if let Err(e) = sweep.run(Timestamp::now()).await {
                tracing::error!(error = %e, retryable = e.is_retryable(), "Intent sweep failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutting down");
}
