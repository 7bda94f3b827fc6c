//! HTTP API server with observability for the slot booking system.
//!
//! Provides REST endpoints for events, time slots and bookings, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use reservation::{CatalogService, Notifier, ReservationEngine, RetryPolicy};
use slot_store::SlotStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/events",
            post(routes::events::create).get(routes::events::list),
        )
        .route(
            "/events/{id}",
            get(routes::events::get).delete(routes::events::delete),
        )
        .route(
            "/events/{event_id}/slots/{slot_id}",
            delete(routes::events::delete_slot),
        )
        .route(
            "/events/{event_id}/bookings",
            post(routes::bookings::create),
        )
        .route(
            "/bookings/{id}",
            get(routes::bookings::get).delete(routes::bookings::cancel),
        )
        .route("/users/{email}/bookings", get(routes::bookings::for_user))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a store and a notifier.
pub fn create_state(
    store: Arc<dyn SlotStore>,
    notifier: Notifier,
    retry: RetryPolicy,
) -> Arc<AppState> {
    Arc::new(AppState {
        engine: ReservationEngine::new(store.clone(), notifier).with_retry_policy(retry),
        catalog: CatalogService::new(store),
    })
}
