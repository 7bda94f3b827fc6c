//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use reservation::{LogSink, NotificationSink, Notifier, RetryPolicy, SmtpSink};
use slot_store::{InMemorySlotStore, PostgresSlotStore, SlotStore, StoreConfig};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn describe_metrics() {
    metrics::describe_counter!("reservations_total", "Reservation attempts by outcome");
    metrics::describe_counter!(
        "reservation_retries_total",
        "Reservation attempts repeated after slot contention"
    );
    metrics::describe_counter!("cancellations_total", "Bookings cancelled");
    metrics::describe_histogram!(
        "reservation_duration_seconds",
        metrics::Unit::Seconds,
        "Time to decide a reservation"
    );
    metrics::describe_counter!("events_created_total", "Events created");
    metrics::describe_counter!(
        "notifications_sent_total",
        "Notifications delivered by kind"
    );
    metrics::describe_counter!(
        "notifications_dropped_total",
        "Notifications dropped because the queue was full"
    );
    metrics::describe_counter!(
        "notifications_failed_total",
        "Notifications the sink failed to deliver"
    );
}

async fn open_store(config: &Config) -> Arc<dyn SlotStore> {
    let store_config = StoreConfig::with_lock_timeout(config.lock_timeout);

    match &config.database_url {
        Some(url) => {
            let store =
                PostgresSlotStore::connect(url, config.database_max_connections, store_config)
                    .await
                    .expect("failed to connect to database");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL slot store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory slot store");
            Arc::new(InMemorySlotStore::with_config(store_config))
        }
    }
}

fn notification_sink(config: &Config) -> Arc<dyn NotificationSink> {
    let Some(smtp) = config.smtp() else {
        tracing::info!("MAIL_SERVER not set, notifications will be logged only");
        return Arc::new(LogSink);
    };

    match SmtpSink::new(&smtp) {
        Ok(sink) => {
            tracing::info!(server = %smtp.server, port = smtp.port, "sending notifications by email");
            Arc::new(sink)
        }
        Err(e) => {
            tracing::warn!(error = %e, "invalid mail settings, notifications will be logged only");
            Arc::new(LogSink)
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().expect("invalid configuration");

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    describe_metrics();

    // 3. Open the store and start notification delivery
    let store = open_store(&config).await;
    let (notifier, worker) =
        Notifier::spawn(notification_sink(&config), config.notify_queue_capacity);
    let retry = RetryPolicy::with_max_attempts(config.reserve_max_attempts);

    // 4. Build the application
    let state = api::create_state(store, notifier, retry);
    let app = api::create_app(state, metrics_handle);

    // 5. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // The router held the last notifier; let queued notifications drain
    if let Err(e) = worker.await {
        tracing::warn!(error = %e, "notification worker failed");
    }

    tracing::info!("server shut down gracefully");
}
