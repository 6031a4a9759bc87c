//! Fitness coaching backend: workout/meal activity logs, derived progress
//! statistics, and a subscription ledger driven by Mollie payments.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

use config::Config;
use db::Store;
use services::{PaymentProvider, PaymentReconciler, StatsEngine, SubscriptionLedger};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub stats: StatsEngine,
    pub ledger: SubscriptionLedger,
    pub payments: PaymentReconciler,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn Store>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let ledger = SubscriptionLedger::new(store.clone());
        let payments = PaymentReconciler::new(
            provider,
            ledger.clone(),
            config.payment_redirect_url(),
            config.payment_webhook_url(),
        );

        Self {
            stats: StatsEngine::new(store.clone()),
            config,
            store,
            ledger,
            payments,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/api/subscription-plans", get(handlers::billing::list_plans))
        .route("/api/webhooks/mollie", post(handlers::billing::mollie_webhook));

    let protected_routes = Router::new()
        // Stats
        .route("/api/user/stats", get(handlers::stats::get_stats))
        .route(
            "/api/user/personal-bests",
            get(handlers::stats::list_personal_bests),
        )
        .route(
            "/api/user/personal-bests/:exercise_id",
            get(handlers::stats::get_personal_best),
        )
        // Event logs
        .route(
            "/api/user/exercise-logs",
            post(handlers::logs::create_exercise_log).get(handlers::logs::list_exercise_logs),
        )
        .route(
            "/api/user/meal-logs",
            post(handlers::logs::create_meal_log).get(handlers::logs::list_meal_logs),
        )
        // Workouts
        .route(
            "/api/user/workouts",
            post(handlers::workouts::start_workout).get(handlers::workouts::list_workouts),
        )
        .route(
            "/api/user/workouts/:id",
            patch(handlers::workouts::update_workout),
        )
        // Billing
        .route(
            "/api/user/subscription",
            get(handlers::billing::get_subscription),
        )
        .route(
            "/api/user/subscription/history",
            get(handlers::billing::subscription_history),
        )
        .route("/api/create-payment", post(handlers::billing::create_payment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = std::iter::once(config.frontend_url.as_str())
        .chain(config.cors_extra_origins.iter().map(String::as_str))
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}
