//! Quotasync Subscribe API
//!
//! Settles subscription orders and keeps gateway quotas in step with them.
//!
//! ## Payment Callback
//!
//! - `GET /api/orders/notify` - Signed payment provider notification
//!
//! ## Admin Endpoints (require `x-admin-key`)
//!
//! - `POST /api/v1/admin/orders/{order_no}/complete` - Settle an order by hand
//! - `POST /api/v1/admin/sync/trigger` - Start a reconciliation pass
//! - `POST /api/v1/admin/sync/resync/{subscription_id}` - Re-push one subscription
//! - `GET /api/v1/admin/groups` - List gateway groups
//!
//! ## User Endpoints (require `x-admin-key`)
//!
//! - `POST /api/v1/users/{user_id}/bind` - Bind an existing gateway account
//! - `GET /api/v1/users/{user_id}/usage` - Usage events in a window
//! - `GET /api/v1/users/{user_id}/usage/today` - Quota consumed today
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics

mod config;
mod error;
mod handlers;
mod scheduler;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use quotasync_billing_core::{
    BindingService, EngineContext, LogNotifier, Notifier, Reconciler, ReminderDispatcher,
    ReminderEvaluator, SettlementService, SmtpNotifier, SystemClock, UsageService,
};
use quotasync_db::Repositories;
use quotasync_gateway::{NewApiClient, QuotaGateway};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::handlers::{health, ready};
use crate::scheduler::run_scheduler;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("subscribe_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quotasync Subscribe API");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    tracing::info!(
        http_port = config.http_port,
        cron_enabled = config.cron_enabled,
        timezone = %config.timezone,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Create database pool
    let pool = quotasync_db::create_pool(&config.database_url).await?;
    quotasync_db::run_migrations(&pool).await?;
    tracing::info!("Database pool created, migrations applied");

    let repos = Repositories::new(pool.clone());

    // Gateway and engine context
    let gateway: Arc<dyn QuotaGateway> = Arc::new(NewApiClient::new(config.gateway.clone())?);
    let clock = Arc::new(SystemClock::new(config.timezone));
    let ctx = EngineContext::new(repos, Arc::clone(&gateway), clock);

    // Reminder delivery
    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp, config.engine.site_name.clone())?),
        None => {
            tracing::warn!("SMTP_SERVER not set, reminders will only be logged");
            Arc::new(LogNotifier::new(config.engine.site_name.clone()))
        }
    };
    let (dispatcher, dispatcher_handle) =
        ReminderDispatcher::spawn(notifier, config.engine.reminder_queue_size);

    // Engine services
    let reminders = ReminderEvaluator::new(ctx.clone(), dispatcher);
    let reconciler = Reconciler::new(ctx.clone(), reminders);
    let state = AppState {
        settlement: SettlementService::new(ctx.clone(), config.engine.clone()),
        reconciler: reconciler.clone(),
        binding: BindingService::new(ctx.clone()),
        usage: UsageService::new(ctx),
        gateway,
        pool,
        config: Arc::clone(&config),
    };

    // Daily schedule
    let shutdown = CancellationToken::new();
    let scheduler = config.cron_enabled.then(|| {
        tokio::spawn(run_scheduler(
            reconciler,
            config.cron_schedule.clone(),
            config.timezone,
            shutdown.clone(),
        ))
    });

    let app = build_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    if let Err(e) = run_http_server(app, addr).await {
        tracing::error!(error = ?e, "HTTP server error");
    }

    // Stop the scheduler, then let queued reminders drain
    shutdown.cancel();
    if let Some(task) = scheduler {
        if let Err(e) = task.await {
            tracing::error!(error = ?e, "Scheduler task failed");
        }
    }
    dispatcher_handle.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API v1 routes
    let api_v1 = Router::new()
        // Admin routes
        .route(
            "/admin/orders/{order_no}/complete",
            post(handlers::complete_order),
        )
        .route("/admin/sync/trigger", post(handlers::trigger_sync))
        .route(
            "/admin/sync/resync/{subscription_id}",
            post(handlers::resync_subscription),
        )
        .route("/admin/groups", get(handlers::list_groups))
        // User routes
        .route("/users/{user_id}/bind", post(handlers::bind_account))
        .route("/users/{user_id}/usage", get(handlers::get_usage))
        .route("/users/{user_id}/usage/today", get(handlers::get_used_today));

    // Payment provider callback (signature checked in the handler)
    let notify_routes = Router::new().route("/api/orders/notify", get(handlers::payment_notify));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(notify_routes)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // A pass touches every active subscription; seconds to minutes
    let pass_buckets = &[0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(quotasync_billing_core::metrics::PASS_DURATION_SECONDS.to_string()),
            pass_buckets,
        )?
        .install_recorder()?;

    metrics::describe_counter!(
        quotasync_billing_core::metrics::SETTLEMENTS_TOTAL,
        "Order settlement attempts by result"
    );
    metrics::describe_counter!(
        quotasync_billing_core::metrics::RECONCILED_SUBSCRIPTIONS_TOTAL,
        "Subscriptions processed by reconciliation passes, by outcome"
    );
    metrics::describe_counter!(
        quotasync_billing_core::metrics::REMINDERS_SENT_TOTAL,
        "Expiry reminder deliveries by result"
    );
    metrics::describe_counter!(
        quotasync_gateway::client::GATEWAY_REQUESTS_TOTAL,
        "Remote quota service calls by operation and result"
    );
    metrics::describe_counter!(
        "quotasync_payment_notifications_total",
        "Payment provider notifications by result"
    );
    metrics::describe_histogram!(
        quotasync_billing_core::metrics::PASS_DURATION_SECONDS,
        "Reconciliation pass duration in seconds"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
