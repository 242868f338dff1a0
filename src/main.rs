use std::sync::Arc;

use task_inbox::api::{AppState, task_routes};
use task_inbox::config::InboxConfig;
use task_inbox::ingest::IngestCoordinator;
use task_inbox::store::{LibSqlBackend, TaskStore};
use task_inbox::tasks::feed::TaskFeed;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = InboxConfig::from_env()?;

    eprintln!("📥 Task Inbox v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path);
    eprintln!("   API: http://0.0.0.0:{}/api/tasks", config.bind_port);
    eprintln!("   Feed: ws://0.0.0.0:{}/ws", config.bind_port);
    for account in &config.mail_accounts {
        eprintln!(
            "   Mail: {} ({})",
            account.username,
            account.provider.imap_host()
        );
    }

    // ── Store ────────────────────────────────────────────────────────
    // The store handle is constructed once here and passed by Arc — no
    // lazily-initialized global.
    let db_path = std::path::Path::new(&config.db_path);
    let store: Arc<dyn TaskStore> = Arc::new(LibSqlBackend::new_local(db_path).await?);

    // ── Ingestion pipeline ───────────────────────────────────────────
    let feed = TaskFeed::new();
    let coordinator = Arc::new(IngestCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&feed),
        config.zone,
    ));

    // ── HTTP/WS boundary ─────────────────────────────────────────────
    let app = task_routes(AppState {
        coordinator,
        store,
        feed,
        retention: config.retention,
    });

    let addr = format!("0.0.0.0:{}", config.bind_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Task Inbox listening");
    axum::serve(listener, app).await?;

    Ok(())
}
