//! HTTP API server for the shuttle booking engine.
//!
//! Exposes booking, availability, payment-callback and reconciliation
//! endpoints, with structured logging (tracing) and Prometheus metrics.

pub mod catalog;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use booking_store::BookingStore;
use common::SystemClock;
use lifecycle::{
    BookingLifecycle, InMemoryPaymentGateway, InMemoryScheduleCatalog, LifecycleConfig, Services,
    TracingNotificationDispatcher,
};
use metrics_exporter_prometheus::PrometheusHandle;
use seat_inventory::SeatInventory;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::bookings::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: BookingStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/bookings", post(routes::bookings::create::<S>))
        .route("/bookings/{id}", get(routes::bookings::get::<S>))
        .route(
            "/bookings/by-reference/{reference}",
            get(routes::bookings::by_reference::<S>),
        )
        .route("/bookings/{id}/cancel", post(routes::bookings::cancel::<S>))
        .route(
            "/bookings/{id}/complete",
            post(routes::bookings::complete::<S>),
        )
        .route(
            "/bookings/{id}/cash-payment",
            post(routes::bookings::cash_payment::<S>),
        )
        .route("/bookings/{id}/history", get(routes::bookings::history::<S>))
        .route(
            "/schedules/{id}/availability",
            get(routes::schedules::availability::<S>),
        )
        .route("/payments/callback", post(routes::payments::callback::<S>))
        .route("/reconciliation", get(routes::reconciliation::list::<S>))
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

/// Registers help text for the metrics the engine emits.
pub fn describe_metrics() {
    metrics::describe_counter!("bookings_created_total", "Bookings created, by payment method");
    metrics::describe_counter!(
        "booking_transitions_total",
        "Persisted booking status transitions, by target status"
    );
    metrics::describe_counter!("seat_holds_granted_total", "Seat holds granted");
    metrics::describe_counter!(
        "seat_holds_rejected_total",
        "Seat hold requests rejected because a seat was taken"
    );
    metrics::describe_counter!("seat_holds_expired_total", "Seat holds released by TTL expiry");
    metrics::describe_counter!(
        "payment_callbacks_total",
        "Payment callbacks handled, by outcome"
    );
    metrics::describe_counter!(
        "reconciliation_cases_total",
        "Payments queued for manual reconciliation, by reason"
    );
    metrics::describe_counter!("notification_failures_total", "Notifications that failed to send");
    metrics::describe_counter!("gateway_retries_total", "Payment gateway calls retried");
    metrics::describe_counter!("bookings_timed_out_total", "Unpaid bookings timed out by the sweep");
    metrics::describe_counter!("bookings_completed_total", "Bookings completed after departure");
    metrics::describe_counter!(
        "store_concurrency_conflicts_total",
        "Booking writes rejected for a stale version"
    );
    metrics::describe_histogram!(
        "gateway_initiate_duration_seconds",
        metrics::Unit::Seconds,
        "Time to initiate a payment with the gateway, including retries"
    );
}

/// Creates application state around an existing lifecycle.
pub fn create_state<S: BookingStore + 'static>(
    lifecycle: Arc<BookingLifecycle<S>>,
) -> Arc<AppState<S>> {
    Arc::new(AppState { lifecycle })
}

/// Creates the default application state with the given store and catalog,
/// the system clock and in-memory gateway and notification services.
pub fn create_default_state<S: BookingStore + 'static>(
    store: S,
    catalog: InMemoryScheduleCatalog,
    config: LifecycleConfig,
) -> Arc<AppState<S>> {
    let clock = Arc::new(SystemClock);
    let services = Services {
        inventory: Arc::new(SeatInventory::new(clock.clone())),
        gateway: Arc::new(InMemoryPaymentGateway::new()),
        notifier: Arc::new(TracingNotificationDispatcher),
        catalog: Arc::new(catalog),
        clock,
    };

    create_state(Arc::new(BookingLifecycle::new(store, services, config)))
}
