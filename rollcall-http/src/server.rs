use axum::{
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::handlers::{
    dispatch_sync_event, enqueue_record, get_calendar, health, list_pending_records, list_registrations,
    register_sync, set_connectivity, AppState,
};
use rollcall::{AcademicCalendar, Database, DatabaseSchema};
use rollcall_sync::{LifecycleEvent, ServiceWorker, SyncConfig, SyncHandler, SyncScheduler};

/// Install the fmt subscriber filtered by RUST_LOG (default `info`).
/// Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Open the attendance database, load the sync config, and bring the worker
/// through install and activate so it is ready for sync events.
pub async fn build_state(data_dir: &Path) -> Result<Arc<AppState>, Box<dyn std::error::Error>> {
    let db = Database::open(data_dir, &DatabaseSchema::attendance())?;
    let calendar = AcademicCalendar::load_or_default(data_dir);
    let config = SyncConfig::load(data_dir)?;
    let policy = config.retry.clone();

    let handler = SyncHandler::new(config, data_dir);
    let worker = ServiceWorker::new(handler);
    worker.dispatch(LifecycleEvent::Install).await?;
    worker.dispatch(LifecycleEvent::Activate).await?;

    let scheduler = SyncScheduler::new(worker, policy);
    Ok(Arc::new(AppState {
        db,
        calendar,
        scheduler,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/calendar", get(get_calendar))
        .route("/records", post(enqueue_record).get(list_pending_records))
        .route("/sync/register", post(register_sync))
        .route("/sync/registrations", get(list_registrations))
        .route("/connectivity", post(set_connectivity))
        .route("/events/sync", post(dispatch_sync_event))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive().max_age(std::time::Duration::from_secs(86400)))
}

pub async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let data_dir = std::env::var("ROLLCALL_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let bind_addr =
        std::env::var("ROLLCALL_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:7710".to_string());

    let state = build_state(Path::new(&data_dir)).await?;
    let status = state.scheduler.status();
    tracing::info!(
        data_dir = %data_dir,
        sync_tag = %status.tag,
        endpoint = %state.scheduler.worker().handler().client().endpoint(),
        "Sync worker active"
    );

    let app = router(state);

    tracing::info!("Starting Rollcall server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
