//! SiteHub Server — session, event, and background maintenance core.
//!
//! Main entry point that wires all crates together and runs until shutdown.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use sitehub_core::config::AppConfig;
use sitehub_core::diagnostics::RequestStats;
use sitehub_core::error::AppError;
use sitehub_core::traits::jobs::JobMonitor;
use sitehub_core::traits::persistence::DurableStore;
use sitehub_events::event::types;
use sitehub_events::EventBus;
use sitehub_jobs::ReportJobQueue;
use sitehub_reaper::{BackgroundReaper, ThreadRegistry};
use sitehub_session::{LoginMessageListener, SessionCounter, SessionManager, SessionRegistry};
use sitehub_storage::{AuditEventListener, AuditLog, LocalDurableStore, LockTable};

#[tokio::main]
async fn main() {
    let env = std::env::var("SITEHUB_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting SiteHub v{}", env!("CARGO_PKG_VERSION"));

    RequestStats::set_enabled(config.session.request_statistics);

    // ── Step 1: Session registry ─────────────────────────────────
    let counter = Arc::new(SessionCounter::new());
    let registry = Arc::new(SessionRegistry::new(Arc::clone(&counter)));
    registry
        .initialize()
        .map_err(|e| AppError::initialization(format!("Session registry init failed: {e}")))?;

    // ── Step 2: Event bus and listeners ──────────────────────────
    let bus = Arc::new(EventBus::new());
    let lock_table = Arc::new(LockTable::new());
    let audit_log = Arc::new(AuditLog::new());

    bus.subscribe_all(Arc::new(AuditEventListener::new(Arc::clone(&audit_log))));
    if let Some(message) = &config.session.login_message {
        bus.subscribe(
            Arc::new(LoginMessageListener::new(
                Arc::clone(&registry),
                message.clone(),
            )),
            &[types::USER_LOGIN],
        );
    }
    tracing::info!("Event listeners registered");

    // ── Step 3: Session manager ──────────────────────────────────
    let session_manager = SessionManager::new(
        Arc::clone(&registry),
        Arc::clone(&bus),
        config.session.clone(),
    );

    // ── Step 4: Durable storage ──────────────────────────────────
    let store = Arc::new(LocalDurableStore::new(
        Arc::clone(&lock_table),
        Arc::clone(&audit_log),
        &config.storage.data_root,
    ));

    // ── Step 5: Worker bookkeeping and report job queue ──────────
    let threads = Arc::new(ThreadRegistry::new());
    let jobs = Arc::new(ReportJobQueue::new(Arc::clone(&threads)));

    // ── Step 6: Background reaper ────────────────────────────────
    let reaper_handle = if config.reaper.enabled {
        let reaper = BackgroundReaper::new(
            Arc::clone(&registry),
            Arc::clone(&threads),
            Arc::clone(&store) as Arc<dyn DurableStore>,
            Arc::clone(&jobs) as Arc<dyn JobMonitor>,
            Arc::clone(&bus),
            config.reaper.clone(),
        );
        Some(reaper.start())
    } else {
        tracing::info!("Background reaper disabled");
        None
    };

    audit_log.record(None, "system_start", format!("v{}", env!("CARGO_PKG_VERSION")));
    tracing::info!("SiteHub core running");

    // ── Step 7: Wait for shutdown signal ─────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    // ── Step 8: Graceful shutdown ────────────────────────────────
    session_manager.broadcast_all(None, "System is shutting down");
    bus.publish_type(types::SYSTEM_SHUTDOWN);

    if let Some(handle) = reaper_handle {
        handle.shutdown().await;
    }

    // Final persist before teardown.
    if let Err(e) = store.flush_locks().await {
        tracing::error!("Final lock flush failed: {}", e);
    }
    if let Err(e) = store.flush_audit_log().await {
        tracing::error!("Final audit flush failed: {}", e);
    }

    registry.shutdown();

    tracing::info!(
        total_sessions = counter.total_created(),
        "SiteHub shut down gracefully"
    );
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
